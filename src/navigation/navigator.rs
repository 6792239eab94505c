use std::sync::Arc;

use crate::clock::Clock;
use crate::constants::{ACCURACY_LIMIT_M, SECOND_IN_MILLIS};
use crate::geo::GeoFix;
use crate::sensors::SensorOrientation;
use crate::signal_processing::normalize_angle;

/// Distance reported when it cannot be computed
pub const DIST_ZERO: f64 = 0.0;

/// Direction reported when it cannot be computed
pub const DIR_ZERO: f64 = 0.0;

/// Speed reported when it cannot be computed
pub const SPEED_ZERO: f64 = 0.0;

/// Navigation state towards a destination
///
/// Holds the current and previous location fix and the destination, and
/// derives distance, direction and speed from them. Heading comes from the
/// optional [`SensorOrientation`] when it is trustworthy, calibrated against
/// the direction of travel whenever the fixes allow it; otherwise from the
/// fixes alone.
///
/// Every getter degrades to a zero value when its inputs are missing. Gate
/// them behind the matching predicate (`is_location_accurate`,
/// `is_bearing_accurate`, ...) before display.
pub struct Navigator {
    location: Option<GeoFix>,
    previous_location: Option<GeoFix>,
    destination: Option<GeoFix>,
    sensor_orientation: Option<SensorOrientation>,
    sensor_bearing_offset: f64,
    clock: Arc<dyn Clock>,
}

impl Navigator {
    /// Navigator without orientation sensors; bearing comes from fixes only
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            location: None,
            previous_location: None,
            destination: None,
            sensor_orientation: None,
            sensor_bearing_offset: 0.0,
            clock,
        }
    }

    pub fn with_sensor_orientation(
        sensor_orientation: SensorOrientation,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sensor_orientation: Some(sensor_orientation),
            ..Self::new(clock)
        }
    }

    /// Make `location` current, shifting the old current fix to previous
    ///
    /// Replaces unconditionally, `None` included. The sensor bearing offset
    /// is recalculated afterwards.
    pub fn set_location(&mut self, location: Option<GeoFix>) {
        self.previous_location = self.location.take();
        self.location = location;

        self.calculate_sensor_bearing_offset();
    }

    /// Like [`Self::set_location`], but drops fixes that add nothing
    ///
    /// A fix repeating the current report (same time and provider) or not
    /// taken later than the current fix is dropped. Returns whether the fix
    /// was applied.
    pub fn offer_location(&mut self, location: GeoFix) -> bool {
        if let Some(current) = &self.location {
            if location.is_same_report(current) {
                log::debug!("dropping repeated fix from {}", location.provider);
                return false;
            }
            if !location.is_newer_than(current) {
                log::debug!(
                    "dropping fix at {} ms, current fix is at {} ms",
                    location.time_millis,
                    current.time_millis
                );
                return false;
            }
        }

        self.set_location(Some(location));
        true
    }

    /// Restore the previous fix, e.g. from persisted state
    ///
    /// Does not recalculate the sensor bearing offset.
    pub fn set_previous_location(&mut self, location: Option<GeoFix>) {
        self.previous_location = location;
    }

    pub fn location(&self) -> Option<&GeoFix> {
        self.location.as_ref()
    }

    pub fn previous_location(&self) -> Option<&GeoFix> {
        self.previous_location.as_ref()
    }

    pub fn set_destination(&mut self, destination: Option<GeoFix>) {
        self.destination = destination;
    }

    pub fn destination(&self) -> Option<&GeoFix> {
        self.destination.as_ref()
    }

    pub fn sensor_orientation(&self) -> Option<&SensorOrientation> {
        self.sensor_orientation.as_ref()
    }

    pub fn sensor_orientation_mut(&mut self) -> Option<&mut SensorOrientation> {
        self.sensor_orientation.as_mut()
    }

    /// Difference between the sensor heading and the location bearing,
    /// subtracted from the sensor heading in [`Self::current_bearing`]
    pub fn sensor_bearing_offset(&self) -> f64 {
        self.sensor_bearing_offset
    }

    /// Great-circle distance to the destination in meters
    pub fn distance(&self) -> f64 {
        match (&self.location, &self.destination) {
            (Some(location), Some(destination)) => location.distance_to(destination),
            _ => DIST_ZERO,
        }
    }

    /// Destination altitude minus current altitude in meters
    pub fn height_difference(&self) -> f64 {
        let altitudes = self
            .location
            .as_ref()
            .and_then(|l| l.altitude)
            .zip(self.destination.as_ref().and_then(|d| d.altitude));

        match altitudes {
            Some((current, destination)) => destination - current,
            None => DIST_ZERO,
        }
    }

    /// Initial bearing from the current location to the destination
    pub fn absolute_direction(&self) -> f64 {
        match (&self.location, &self.destination) {
            (Some(location), Some(destination)) => location.bearing_to(destination),
            _ => DIR_ZERO,
        }
    }

    /// Direction to the destination relative to the current bearing
    ///
    /// This is the angle to rotate a "straight ahead" arrow by.
    pub fn relative_direction(&self) -> f64 {
        if !self.is_bearing_accurate() {
            return DIR_ZERO;
        }

        normalize_angle(self.absolute_direction() - self.current_bearing())
    }

    /// Best estimate of the direction the user is facing
    ///
    /// The calibrated sensor heading when sensors are accurate, the location
    /// bearing otherwise.
    pub fn current_bearing(&self) -> f64 {
        match &self.sensor_orientation {
            Some(sensor) if sensor.has_orientation() => {
                normalize_angle(sensor.orientation() - self.sensor_bearing_offset)
            }
            _ => self.location_bearing(),
        }
    }

    /// Direction of travel according to location fixes
    ///
    /// The bearing reported by the current fix if it has one, else the
    /// bearing from the previous to the current fix when that is accurate.
    pub fn location_bearing(&self) -> f64 {
        if let Some(bearing) = self.location.as_ref().and_then(|l| l.bearing) {
            return bearing;
        }

        match (&self.previous_location, &self.location) {
            (Some(previous), Some(current)) if self.is_location_bearing_accurate() => {
                previous.bearing_to(current)
            }
            _ => DIR_ZERO,
        }
    }

    /// Current fix is accurate and the destination lies within its accuracy radius
    pub fn is_destination_reached(&self) -> bool {
        match (&self.location, &self.destination) {
            (Some(location), Some(_)) => {
                self.is_location_accurate() && self.distance() < location.accuracy_radius()
            }
            _ => false,
        }
    }

    /// Speed in m/s
    ///
    /// The speed reported by the current fix wins. Otherwise it is derived
    /// from the previous fix, but only when the distance between them
    /// exceeds both accuracy radii and time moved forward.
    pub fn current_speed(&self) -> f64 {
        let Some(current) = &self.location else {
            return SPEED_ZERO;
        };
        if let Some(speed) = current.speed {
            return speed;
        }

        let Some(previous) = &self.previous_location else {
            return SPEED_ZERO;
        };
        if previous == current {
            return SPEED_ZERO;
        }

        let Some(elapsed_millis) = current.time_millis.checked_sub(previous.time_millis) else {
            return SPEED_ZERO;
        };
        let distance = current.distance_to(previous);
        if elapsed_millis > 0
            && distance > current.accuracy_radius()
            && distance > previous.accuracy_radius()
        {
            distance / (elapsed_millis as f64 / SECOND_IN_MILLIS)
        } else {
            SPEED_ZERO
        }
    }

    /// Current fix exists, is recent, and its accuracy is within the limit
    pub fn is_location_accurate(&self) -> bool {
        self.location.as_ref().is_some_and(|location| {
            location.is_recent(self.clock.as_ref())
                && location.accuracy_radius() <= ACCURACY_LIMIT_M
        })
    }

    /// The movement between the previous and current fix defines a direction
    ///
    /// Both fixes recent and distinct, the current one accurate, and the
    /// distance between them larger than the current accuracy radius.
    pub fn is_location_bearing_accurate(&self) -> bool {
        if !self.is_location_accurate() {
            return false;
        }

        match (&self.previous_location, &self.location) {
            (Some(previous), Some(current)) => {
                previous.is_recent(self.clock.as_ref())
                    && previous != current
                    && previous.distance_to(current) > current.accuracy_radius()
            }
            _ => false,
        }
    }

    pub fn is_sensor_bearing_accurate(&self) -> bool {
        self.sensor_orientation
            .as_ref()
            .is_some_and(SensorOrientation::has_orientation)
    }

    /// Either bearing source can be trusted; sensors work while stationary
    pub fn is_bearing_accurate(&self) -> bool {
        self.is_sensor_bearing_accurate() || self.is_location_bearing_accurate()
    }

    /// Re-anchor the sensor heading to the location bearing
    ///
    /// The offset is set when both the sensor heading and a location bearing
    /// can be trusted, and reset to zero otherwise.
    pub fn calculate_sensor_bearing_offset(&mut self) {
        let has_location_bearing = self.location.as_ref().is_some_and(|l| l.bearing.is_some())
            || self.is_location_bearing_accurate();

        self.sensor_bearing_offset = match &self.sensor_orientation {
            Some(sensor) if sensor.has_orientation() && has_location_bearing => {
                sensor.orientation() - self.location_bearing()
            }
            _ => 0.0,
        };
        log::trace!("sensor bearing offset: {:.1}", self.sensor_bearing_offset);
    }
}
