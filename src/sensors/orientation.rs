use std::sync::Arc;

use crate::clock::{Clock, is_timestamp_recent};
use crate::config::SensorConfig;
use crate::constants::{SENSOR_EXPIRE_NANOS, SENSOR_UPDATE_INTERVAL_NANOS, SENSOR_UPDATE_INTERVAL_US};
use crate::error::Result;
use crate::signal_processing::{
    average_value, azimuth_degrees, filter_value_set, normalize_angle, rotation_matrix,
};

use super::{SensorAvailability, SensorKind, SensorSample, SensorSet, SensorSource, select_sensor_set};

/// Handle returned by [`SensorOrientation::add_listener`]
pub type ListenerId = u64;

/// Receiver of heading updates
///
/// Called synchronously from the `set_*` method that accepted a sample.
pub trait OrientationListener: Send {
    fn on_orientation_changed(&mut self, heading: f64);
}

impl<F> OrientationListener for F
where
    F: FnMut(f64) + Send,
{
    fn on_orientation_changed(&mut self, heading: f64) {
        self(heading)
    }
}

/// Last accepted reading of one sensor
#[derive(Debug, Default, Clone)]
struct SensorReading {
    /// Low pass filtered values (raw sensors only)
    values: Option<Vec<f64>>,
    /// Event timestamp of the sample, used for throttling
    event_nanos: Option<u64>,
    /// Clock time the sample was accepted, used for freshness
    received_nanos: Option<u64>,
}

impl SensorReading {
    /// A sample closer than the update interval to the last accepted one,
    /// or older than it, is dropped.
    fn is_throttled(&self, timestamp_nanos: u64) -> bool {
        match self.event_nanos {
            Some(last) => timestamp_nanos < last.saturating_add(SENSOR_UPDATE_INTERVAL_NANOS),
            None => false,
        }
    }
}

/// Heading from orientation sensors
///
/// Fuses accelerometer and magnetometer samples into a compass heading, or
/// takes the heading from a platform orientation sensor when one is used.
/// Sensor presence is probed once from the [`SensorSource`]; the enabled
/// switch and sensor mode come from [`SensorConfig`].
///
/// The platform subscription is reference counted by listeners: the sensors
/// are registered when the first listener is added and unregistered when the
/// last one is removed.
pub struct SensorOrientation {
    config: SensorConfig,
    source: Box<dyn SensorSource>,
    clock: Arc<dyn Clock>,
    availability: SensorAvailability,
    accelerometer: SensorReading,
    magnetic_field: SensorReading,
    orientation_sensor: SensorReading,
    heading: Option<f64>,
    listeners: Vec<(ListenerId, Box<dyn OrientationListener>)>,
    next_listener_id: ListenerId,
    subscribed: Option<SensorSet>,
}

impl SensorOrientation {
    /// Create a sensor fuser
    ///
    /// # Errors
    /// `NavError::Config` if an alpha in `config` is outside [0, 1].
    pub fn new(
        config: SensorConfig,
        source: Box<dyn SensorSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let availability = source.availability();
        log::debug!("sensor availability: {:?}", availability);

        Ok(Self {
            config,
            source,
            clock,
            availability,
            accelerometer: SensorReading::default(),
            magnetic_field: SensorReading::default(),
            orientation_sensor: SensorReading::default(),
            heading: None,
            listeners: Vec::new(),
            next_listener_id: 0,
            subscribed: None,
        })
    }

    /// Feed a sample of any kind to the matching setter
    pub fn handle_sample(&mut self, sample: &SensorSample) -> bool {
        match sample.kind {
            SensorKind::Accelerometer => self.set_acceleration(sample),
            SensorKind::MagneticField => self.set_magnetic_field(sample),
            SensorKind::Orientation => self.set_orientation(sample),
        }
    }

    /// Accept an accelerometer sample; returns false if it was dropped
    pub fn set_acceleration(&mut self, sample: &SensorSample) -> bool {
        if sample.kind != SensorKind::Accelerometer {
            return false;
        }
        let alpha = self.config.low_pass_alpha;
        let now = self.clock.elapsed_nanos();
        if !Self::accept_vector(&mut self.accelerometer, sample, alpha, now) {
            return false;
        }

        self.calculate_orientation();
        self.notify_listeners();
        true
    }

    /// Accept a magnetometer sample; returns false if it was dropped
    pub fn set_magnetic_field(&mut self, sample: &SensorSample) -> bool {
        if sample.kind != SensorKind::MagneticField {
            return false;
        }
        let alpha = self.config.low_pass_alpha;
        let now = self.clock.elapsed_nanos();
        if !Self::accept_vector(&mut self.magnetic_field, sample, alpha, now) {
            return false;
        }

        self.calculate_orientation();
        self.notify_listeners();
        true
    }

    /// Accept a platform orientation sample; returns false if it was dropped
    pub fn set_orientation(&mut self, sample: &SensorSample) -> bool {
        if sample.kind != SensorKind::Orientation {
            return false;
        }
        let azimuth = match sample.values.first() {
            Some(&azimuth) if azimuth.is_finite() => azimuth,
            _ => {
                log::trace!("ignoring malformed orientation sample: {:?}", sample.values);
                return false;
            }
        };
        if self.orientation_sensor.is_throttled(sample.timestamp_nanos) {
            log::trace!("throttled orientation sample at {}", sample.timestamp_nanos);
            return false;
        }

        self.heading = Some(normalize_angle(azimuth));
        self.orientation_sensor.event_nanos = Some(sample.timestamp_nanos);
        self.orientation_sensor.received_nanos = Some(self.clock.elapsed_nanos());

        self.notify_listeners();
        true
    }

    fn accept_vector(
        reading: &mut SensorReading,
        sample: &SensorSample,
        alpha: f64,
        now: u64,
    ) -> bool {
        let Some(values) = sample.vector3() else {
            log::trace!("ignoring malformed {:?} sample: {:?}", sample.kind, sample.values);
            return false;
        };
        if reading.is_throttled(sample.timestamp_nanos) {
            log::trace!("throttled {:?} sample at {}", sample.kind, sample.timestamp_nanos);
            return false;
        }

        match filter_value_set(reading.values.as_deref(), &values, alpha) {
            Ok(filtered) => reading.values = Some(filtered),
            Err(e) => {
                log::warn!("dropping {:?} sample: {}", sample.kind, e);
                return false;
            }
        }
        reading.event_nanos = Some(sample.timestamp_nanos);
        reading.received_nanos = Some(now);
        true
    }

    /// Fold the azimuth of the latest raw vectors into the heading
    ///
    /// Returns the new heading, or `None` when a vector is missing or the
    /// pair does not define a rotation.
    fn calculate_orientation(&mut self) -> Option<f64> {
        let gravity = as_vector3(self.accelerometer.values.as_deref())?;
        let geomagnetic = as_vector3(self.magnetic_field.values.as_deref())?;

        let rotation = rotation_matrix(&gravity, &geomagnetic)?;
        let azimuth = azimuth_degrees(&rotation);

        let heading = match self.heading {
            // First azimuth seeds the heading instead of being dragged up from 0°
            None => azimuth,
            Some(current) => match average_value(current, azimuth, self.config.azimuth_alpha) {
                Ok(averaged) => averaged,
                Err(e) => {
                    log::warn!("heading not updated: {}", e);
                    return None;
                }
            },
        };
        self.heading = Some(heading);
        Some(heading)
    }

    fn is_fresh(&self, reading: &SensorReading) -> bool {
        reading.received_nanos.is_some_and(|received| {
            is_timestamp_recent(self.clock.elapsed_nanos(), received, SENSOR_EXPIRE_NANOS)
                .unwrap_or(false)
        })
    }

    /// Whether [`Self::orientation`] can be trusted right now
    ///
    /// Requires sensors to be enabled, a heading to exist, and the samples
    /// it came from to be recent.
    pub fn has_orientation(&self) -> bool {
        if !self.config.enabled || self.heading.is_none() {
            return false;
        }

        let raw_fresh = self.availability.has_raw_pair()
            && self.is_fresh(&self.accelerometer)
            && self.is_fresh(&self.magnetic_field);
        let orientation_fresh =
            self.availability.orientation && self.is_fresh(&self.orientation_sensor);

        raw_fresh || orientation_fresh
    }

    /// Current heading in degrees [0, 360), 0 before the first heading
    pub fn orientation(&self) -> f64 {
        self.heading.unwrap_or(0.0)
    }

    /// Device can provide a heading at all, enabled or not
    pub fn has_sensors(&self) -> bool {
        self.availability.has_raw_pair() || self.availability.orientation
    }

    pub fn is_sensors_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn availability(&self) -> SensorAvailability {
        self.availability
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Replace the sensor configuration
    ///
    /// An active subscription is re-registered so a changed mode or switch
    /// takes effect immediately.
    pub fn update_config(&mut self, config: SensorConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        if !self.listeners.is_empty() {
            self.unregister_events();
            self.register_events();
        }
        Ok(())
    }

    /// Sensor set currently registered with the source
    pub fn subscribed_sensors(&self) -> Option<SensorSet> {
        self.subscribed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Add a listener; the first one registers for sensor events
    pub fn add_listener(&mut self, listener: Box<dyn OrientationListener>) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, listener));

        if self.listeners.len() == 1 {
            self.register_events();
        }
        id
    }

    /// Remove a listener; removing the last one unregisters sensor events
    ///
    /// Returns false if `id` is not a current listener.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let Some(index) = self.listeners.iter().position(|(lid, _)| *lid == id) else {
            return false;
        };
        self.listeners.remove(index);

        if self.listeners.is_empty() {
            self.unregister_events();
        }
        true
    }

    fn register_events(&mut self) {
        if !self.config.enabled {
            log::debug!("sensors disabled, not registering");
            return;
        }
        let Some(set) = select_sensor_set(self.config.mode, self.availability) else {
            log::debug!("no sensors usable in {} mode", self.config.mode);
            return;
        };

        for &kind in set.kinds() {
            if !self.source.register(kind, SENSOR_UPDATE_INTERVAL_US) {
                log::warn!("failed to register for {:?} events", kind);
            }
        }
        log::debug!("registered for {:?}", set);
        self.subscribed = Some(set);
    }

    fn unregister_events(&mut self) {
        if let Some(set) = self.subscribed.take() {
            for &kind in set.kinds() {
                self.source.unregister(kind);
            }
            log::debug!("unregistered from {:?}", set);
        }
    }

    fn notify_listeners(&mut self) {
        let heading = self.orientation();
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_orientation_changed(heading);
        }
    }
}

impl Drop for SensorOrientation {
    fn drop(&mut self) {
        self.unregister_events();
    }
}

fn as_vector3(values: Option<&[f64]>) -> Option<[f64; 3]> {
    match values? {
        &[x, y, z] => Some([x, y, z]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::OrientationSensorMode;
    use crate::constants::MILLI_IN_NANOS;
    use approx::assert_abs_diff_eq;
    use std::sync::Mutex;

    const GRAVITY: [f64; 3] = [0.0, 0.0, 9.81];
    const FIELD_NORTH: [f64; 3] = [0.0, 20.0, -40.0];
    const FIELD_EAST: [f64; 3] = [-20.0, 0.0, -40.0];

    #[derive(Clone, Default)]
    struct RecordingSource {
        availability: SensorAvailability,
        registered: Arc<Mutex<Vec<SensorKind>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl SensorSource for RecordingSource {
        fn availability(&self) -> SensorAvailability {
            self.availability
        }

        fn register(&mut self, kind: SensorKind, _sampling_period_us: u32) -> bool {
            self.registered.lock().unwrap().push(kind);
            self.calls.lock().unwrap().push(format!("register {:?}", kind));
            true
        }

        fn unregister(&mut self, kind: SensorKind) {
            self.registered.lock().unwrap().retain(|k| *k != kind);
            self.calls.lock().unwrap().push(format!("unregister {:?}", kind));
        }
    }

    fn fixture(
        availability: SensorAvailability,
        config: SensorConfig,
    ) -> (SensorOrientation, RecordingSource, ManualClock) {
        let source = RecordingSource {
            availability,
            ..Default::default()
        };
        let clock = ManualClock::new(1_000 * MILLI_IN_NANOS, 0);
        let orientation =
            SensorOrientation::new(config, Box::new(source.clone()), Arc::new(clock.clone()))
                .unwrap();
        (orientation, source, clock)
    }

    fn ms(millis: u64) -> u64 {
        millis * MILLI_IN_NANOS
    }

    #[test]
    fn test_no_orientation_before_samples() {
        let (orientation, _, _) = fixture(SensorAvailability::all(), SensorConfig::default());
        assert!(orientation.has_sensors());
        assert!(!orientation.has_orientation());
        assert_eq!(orientation.orientation(), 0.0);
    }

    #[test]
    fn test_raw_pair_produces_heading() {
        let (mut orientation, _, _) =
            fixture(SensorAvailability::raw_only(), SensorConfig::default());

        assert!(orientation.set_acceleration(&SensorSample::accelerometer(ms(1), GRAVITY)));
        // one vector is not enough
        assert!(!orientation.has_orientation());

        assert!(orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(1), FIELD_EAST)));
        assert!(orientation.has_orientation());
        assert_abs_diff_eq!(orientation.orientation(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_is_damped() {
        let (mut orientation, _, _) =
            fixture(SensorAvailability::raw_only(), SensorConfig::default());
        orientation.set_acceleration(&SensorSample::accelerometer(ms(1), GRAVITY));
        orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(1), FIELD_NORTH));
        assert_abs_diff_eq!(orientation.orientation(), 0.0, epsilon = 1e-9);

        // Turn to face east; the heading must creep, not jump
        orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(300), FIELD_EAST));
        let heading = orientation.orientation();
        assert!(heading > 0.0 && heading < 10.0, "heading {}", heading);

        for i in 2..200 {
            orientation.set_magnetic_field(&SensorSample::magnetic_field(
                ms(300 * i),
                FIELD_EAST,
            ));
        }
        assert_abs_diff_eq!(orientation.orientation(), 90.0, epsilon = 0.5);
    }

    #[test]
    fn test_heading_crosses_north_on_short_arc() {
        let (mut orientation, _, _) =
            fixture(SensorAvailability::raw_only(), SensorConfig::default());
        // horizontal field for a device facing `heading` degrees
        let facing = |heading: f64| {
            let radians = heading.to_radians();
            [-20.0 * radians.sin(), 20.0 * radians.cos(), -40.0]
        };
        orientation.set_acceleration(&SensorSample::accelerometer(ms(1), GRAVITY));
        orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(1), facing(60.0)));
        assert_abs_diff_eq!(orientation.orientation(), 60.0, epsilon = 1e-9);

        // 60° -> 300° is 120° through north, 240° through south
        for i in 1..400 {
            orientation.set_magnetic_field(&SensorSample::magnetic_field(
                ms(300 * i),
                facing(300.0),
            ));
            let heading = orientation.orientation();
            assert!(
                heading <= 60.0 + 1e-9 || heading >= 300.0 - 1e-9,
                "heading {} went through south",
                heading
            );
        }
        assert_abs_diff_eq!(orientation.orientation(), 300.0, epsilon = 0.5);
    }

    #[test]
    fn test_throttling() {
        let (mut orientation, _, _) =
            fixture(SensorAvailability::raw_only(), SensorConfig::default());
        assert!(orientation.set_acceleration(&SensorSample::accelerometer(ms(1000), GRAVITY)));
        // within 200 ms of the last accepted sample
        assert!(!orientation.set_acceleration(&SensorSample::accelerometer(ms(1100), GRAVITY)));
        // out of order
        assert!(!orientation.set_acceleration(&SensorSample::accelerometer(ms(500), GRAVITY)));
        // exactly one interval later
        assert!(orientation.set_acceleration(&SensorSample::accelerometer(ms(1200), GRAVITY)));
        // throttling is per sensor kind
        assert!(orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(1250), FIELD_NORTH)));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let (mut orientation, _, _) = fixture(SensorAvailability::all(), SensorConfig::default());
        assert!(!orientation.set_acceleration(&SensorSample::magnetic_field(ms(1), FIELD_NORTH)));
        assert!(!orientation.set_magnetic_field(&SensorSample::accelerometer(ms(1), GRAVITY)));
        assert!(!orientation.set_orientation(&SensorSample::accelerometer(ms(1), GRAVITY)));
        assert!(!orientation.has_orientation());
    }

    #[test]
    fn test_malformed_samples_ignored() {
        let (mut orientation, _, _) = fixture(SensorAvailability::all(), SensorConfig::default());
        let short = SensorSample::new(SensorKind::Accelerometer, vec![0.0, 9.81], ms(1));
        let long = SensorSample::new(SensorKind::MagneticField, vec![0.0; 6], ms(1));
        let empty = SensorSample::new(SensorKind::Orientation, vec![], ms(1));
        assert!(!orientation.set_acceleration(&short));
        assert!(!orientation.set_magnetic_field(&long));
        assert!(!orientation.set_orientation(&empty));
        assert!(!orientation.has_orientation());

        // A malformed sample does not count for throttling
        assert!(orientation.set_acceleration(&SensorSample::accelerometer(ms(1), GRAVITY)));
    }

    #[test]
    fn test_orientation_sensor_used_directly() {
        let (mut orientation, _, _) = fixture(SensorAvailability::all(), SensorConfig::default());
        assert!(orientation.set_orientation(&SensorSample::orientation(ms(1), 370.0)));
        assert!(orientation.has_orientation());
        assert_abs_diff_eq!(orientation.orientation(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_goes_stale() {
        let (mut orientation, _, clock) =
            fixture(SensorAvailability::all(), SensorConfig::default());
        orientation.set_orientation(&SensorSample::orientation(ms(1), 45.0));
        assert!(orientation.has_orientation());

        clock.advance_millis(5000);
        assert!(orientation.has_orientation());

        clock.advance_millis(1);
        assert!(!orientation.has_orientation());
        // the last value is still reported, only the predicate changes
        assert_abs_diff_eq!(orientation.orientation(), 45.0);
    }

    #[test]
    fn test_raw_pair_requires_both_fresh() {
        let (mut orientation, _, clock) =
            fixture(SensorAvailability::raw_only(), SensorConfig::default());
        orientation.set_acceleration(&SensorSample::accelerometer(ms(1), GRAVITY));
        orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(1), FIELD_NORTH));
        assert!(orientation.has_orientation());

        clock.advance_millis(4000);
        orientation.set_magnetic_field(&SensorSample::magnetic_field(ms(4001), FIELD_NORTH));
        clock.advance_millis(2000);
        // magnetometer is fresh, accelerometer is 6 s old
        assert!(!orientation.has_orientation());
    }

    #[test]
    fn test_disabled_sensors_have_no_orientation() {
        let config = SensorConfig {
            enabled: false,
            ..SensorConfig::default()
        };
        let (mut orientation, source, _) = fixture(SensorAvailability::all(), config);
        assert!(orientation.has_sensors());
        assert!(!orientation.is_sensors_enabled());

        orientation.set_orientation(&SensorSample::orientation(ms(1), 45.0));
        assert!(!orientation.has_orientation());

        orientation.add_listener(Box::new(|_: f64| {}));
        assert!(source.registered.lock().unwrap().is_empty());
        assert_eq!(orientation.subscribed_sensors(), None);
    }

    #[test]
    fn test_no_sensors() {
        let (orientation, _, _) = fixture(SensorAvailability::none(), SensorConfig::default());
        assert!(!orientation.has_sensors());
        assert!(!orientation.has_orientation());
    }

    #[test]
    fn test_listener_reference_counting() {
        let (mut orientation, source, _) =
            fixture(SensorAvailability::raw_only(), SensorConfig::default());

        let first = orientation.add_listener(Box::new(|_: f64| {}));
        let second = orientation.add_listener(Box::new(|_: f64| {}));
        assert_eq!(
            *source.registered.lock().unwrap(),
            vec![SensorKind::Accelerometer, SensorKind::MagneticField]
        );
        assert_eq!(
            orientation.subscribed_sensors(),
            Some(SensorSet::AccelerometerMagnetometer)
        );

        assert!(orientation.remove_listener(first));
        assert_eq!(source.registered.lock().unwrap().len(), 2);

        assert!(orientation.remove_listener(second));
        assert!(source.registered.lock().unwrap().is_empty());
        assert_eq!(orientation.subscribed_sensors(), None);

        assert!(!orientation.remove_listener(second));
        // register + unregister exactly once per sensor
        assert_eq!(source.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_mode_selects_sensors() {
        let config = SensorConfig {
            mode: OrientationSensorMode::Auto,
            ..SensorConfig::default()
        };
        let (mut orientation, source, _) = fixture(SensorAvailability::all(), config);
        orientation.add_listener(Box::new(|_: f64| {}));
        assert_eq!(
            *source.registered.lock().unwrap(),
            vec![SensorKind::Orientation]
        );

        let raw = SensorConfig {
            mode: OrientationSensorMode::Raw,
            ..SensorConfig::default()
        };
        orientation.update_config(raw).unwrap();
        assert_eq!(
            *source.registered.lock().unwrap(),
            vec![SensorKind::Accelerometer, SensorKind::MagneticField]
        );
    }

    #[test]
    fn test_listeners_notified() {
        let (mut orientation, _, _) = fixture(SensorAvailability::all(), SensorConfig::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        orientation.add_listener(Box::new(move |heading: f64| {
            sink.lock().unwrap().push(heading)
        }));

        orientation.set_orientation(&SensorSample::orientation(ms(1), 30.0));
        orientation.set_orientation(&SensorSample::orientation(ms(50), 40.0));
        orientation.set_orientation(&SensorSample::orientation(ms(400), 50.0));

        assert_eq!(*received.lock().unwrap(), vec![30.0, 50.0]);
    }

    #[test]
    fn test_unregister_on_drop() {
        let (mut orientation, source, _) =
            fixture(SensorAvailability::all(), SensorConfig::default());
        orientation.add_listener(Box::new(|_: f64| {}));
        assert!(!source.registered.lock().unwrap().is_empty());
        drop(orientation);
        assert!(source.registered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SensorConfig {
            azimuth_alpha: -0.1,
            ..SensorConfig::default()
        };
        let source = RecordingSource::default();
        let clock = Arc::new(ManualClock::default());
        assert!(SensorOrientation::new(config, Box::new(source), clock).is_err());
    }
}
