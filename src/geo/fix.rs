use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, is_timestamp_recent};
use crate::constants::{EARTH_RADIUS_M, LOCATION_EXPIRE_MILLIS, LOCATION_EXPIRE_NANOS};
use crate::signal_processing::normalize_angle;

/// A single location reading
///
/// Optional quantities are `None` when the provider did not report them.
/// Two timestamps are carried: the wall-clock time the fix was taken
/// (`time_millis`, used for time deltas between fixes) and, when available,
/// the monotonic time it was received (`elapsed_realtime_nanos`, preferred
/// for freshness checks because it never jumps).
///
/// # Example
/// ```
/// use backtrack::geo::GeoFix;
///
/// let home = GeoFix::new("gps", 51.0, 4.0);
/// let shop = home.offset_by(90.0, 250.0);
/// assert!((home.distance_to(&shop) - 250.0).abs() < 1e-6);
/// assert!((home.bearing_to(&shop) - 90.0).abs() < 0.01);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    /// Name of the provider that produced the fix ("gps", "network", ...)
    #[serde(default)]
    pub provider: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters above the WGS84 ellipsoid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Direction of travel in degrees [0, 360)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
    /// Ground speed in m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Horizontal accuracy radius in meters (68% confidence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Wall-clock time of the fix, milliseconds since the Unix epoch
    #[serde(default)]
    pub time_millis: i64,
    /// Monotonic receive time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_realtime_nanos: Option<u64>,
}

impl GeoFix {
    pub fn new(provider: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            provider: provider.into(),
            latitude,
            longitude,
            altitude: None,
            bearing: None,
            speed: None,
            accuracy: None,
            time_millis: 0,
            elapsed_realtime_nanos: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(normalize_angle(bearing));
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_time_millis(mut self, time_millis: i64) -> Self {
        self.time_millis = time_millis;
        self
    }

    pub fn with_elapsed_realtime_nanos(mut self, nanos: u64) -> Self {
        self.elapsed_realtime_nanos = Some(nanos);
        self
    }

    /// Accuracy radius in meters, 0 when the provider did not report one
    pub fn accuracy_radius(&self) -> f64 {
        self.accuracy.unwrap_or(0.0)
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_to(&self, other: &GeoFix) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_M * c
    }

    /// Initial great-circle bearing towards `other`, degrees [0, 360)
    pub fn bearing_to(&self, other: &GeoFix) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let y = delta_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

        normalize_angle(y.atan2(x).to_degrees())
    }

    /// Point reached by travelling `distance_m` along the great circle that
    /// starts at this fix with initial bearing `bearing_deg`.
    ///
    /// The result keeps the provider and timestamps of this fix but none of
    /// its optional measurements.
    pub fn offset_by(&self, bearing_deg: f64, distance_m: f64) -> GeoFix {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let bearing = bearing_deg.to_radians();
        let angular = distance_m / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        let longitude = normalize_angle(lon2.to_degrees() + 180.0) - 180.0;

        GeoFix {
            provider: self.provider.clone(),
            latitude: lat2.to_degrees(),
            longitude,
            altitude: None,
            bearing: None,
            speed: None,
            accuracy: None,
            time_millis: self.time_millis,
            elapsed_realtime_nanos: self.elapsed_realtime_nanos,
        }
    }

    /// Whether the fix is younger than the location expiry window
    ///
    /// Uses the monotonic receive time when the fix carries one, the wall
    /// clock otherwise.
    pub fn is_recent(&self, clock: &dyn Clock) -> bool {
        match self.elapsed_realtime_nanos {
            Some(received) => {
                is_timestamp_recent(clock.elapsed_nanos(), received, LOCATION_EXPIRE_NANOS)
                    .unwrap_or(false)
            }
            None => {
                let now = clock.wall_millis();
                now >= self.time_millis
                    && self.time_millis >= 0
                    && (now - self.time_millis) as u64 <= LOCATION_EXPIRE_MILLIS
            }
        }
    }

    /// Whether this fix was taken later than `other`
    pub fn is_newer_than(&self, other: &GeoFix) -> bool {
        self.time_millis > other.time_millis
    }

    /// Whether both fixes are the same report: same time from the same provider
    pub fn is_same_report(&self, other: &GeoFix) -> bool {
        self.time_millis == other.time_millis && self.provider == other.provider
    }
}

impl fmt::Display for GeoFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Parses `"LAT,LON"` in decimal degrees, e.g. `"50.8467,4.3525"`
impl FromStr for GeoFix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .trim()
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON: {}", s))?;

        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude: {}", lat))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude: {}", lon))?;

        if !(-90.0..=90.0).contains(&latitude) {
            return Err("latitude must be between -90 and 90".to_string());
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err("longitude must be between -180 and 180".to_string());
        }

        Ok(GeoFix::new("manual", latitude, longitude))
    }
}
