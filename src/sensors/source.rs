use crate::config::OrientationSensorMode;

use super::SensorKind;

/// Sensors present on the device, probed once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorAvailability {
    pub accelerometer: bool,
    pub magnetic_field: bool,
    pub orientation: bool,
}

impl SensorAvailability {
    pub fn all() -> Self {
        Self {
            accelerometer: true,
            magnetic_field: true,
            orientation: true,
        }
    }

    pub fn raw_only() -> Self {
        Self {
            accelerometer: true,
            magnetic_field: true,
            orientation: false,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Accelerometer and magnetometer are both present
    pub fn has_raw_pair(&self) -> bool {
        self.accelerometer && self.magnetic_field
    }
}

/// Group of sensors subscribed to together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSet {
    /// Platform orientation sensor alone
    Orientation,
    /// Accelerometer and magnetometer, fused into a heading
    AccelerometerMagnetometer,
}

impl SensorSet {
    pub fn kinds(&self) -> &'static [SensorKind] {
        match self {
            Self::Orientation => &[SensorKind::Orientation],
            Self::AccelerometerMagnetometer => {
                &[SensorKind::Accelerometer, SensorKind::MagneticField]
            }
        }
    }
}

/// Choose which sensors to subscribe to for a mode
///
/// `Auto` and `Calculated` prefer the platform orientation sensor and fall
/// back to the raw pair; `Raw` only uses the raw pair. `None` when the
/// device has nothing usable for the mode.
pub fn select_sensor_set(
    mode: OrientationSensorMode,
    availability: SensorAvailability,
) -> Option<SensorSet> {
    match mode {
        OrientationSensorMode::Auto | OrientationSensorMode::Calculated
            if availability.orientation =>
        {
            Some(SensorSet::Orientation)
        }
        _ if availability.has_raw_pair() => Some(SensorSet::AccelerometerMagnetometer),
        _ => None,
    }
}

/// Platform capability that (un)registers for sensor events
///
/// Samples are not delivered through this trait; the platform pushes them
/// into [`super::SensorOrientation`] once registered.
pub trait SensorSource: Send {
    /// Which sensors exist on the device
    fn availability(&self) -> SensorAvailability;

    /// Start delivering samples of `kind`; false if the platform refused
    fn register(&mut self, kind: SensorKind, sampling_period_us: u32) -> bool;

    /// Stop delivering samples of `kind`
    fn unregister(&mut self, kind: SensorKind);
}

/// Source for recorded or simulated sample streams
///
/// Samples arrive from a file or generator whatever is registered, so
/// registration only has to be accepted.
#[derive(Debug, Clone)]
pub struct ReplaySensorSource {
    availability: SensorAvailability,
}

impl ReplaySensorSource {
    pub fn new(availability: SensorAvailability) -> Self {
        Self { availability }
    }
}

impl SensorSource for ReplaySensorSource {
    fn availability(&self) -> SensorAvailability {
        self.availability
    }

    fn register(&mut self, kind: SensorKind, sampling_period_us: u32) -> bool {
        log::trace!("replay: register {:?} at {} us", kind, sampling_period_us);
        true
    }

    fn unregister(&mut self, kind: SensorKind) {
        log::trace!("replay: unregister {:?}", kind);
    }
}
