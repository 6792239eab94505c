use serde::{Deserialize, Serialize};

use crate::constants::SENSOR_VALUES_SIZE;

/// Physical or virtual sensor a sample comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Acceleration including gravity, m/s², device coordinates
    Accelerometer,
    /// Geomagnetic field, μT, device coordinates
    MagneticField,
    /// Platform orientation sensor; `values[0]` is the azimuth in degrees
    Orientation,
}

/// One timestamped reading as delivered by the sensor source
///
/// Values are kept as delivered: a sample with the wrong number of components
/// is representable, and is ignored by the fuser rather than rejected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub values: Vec<f64>,
    /// Event time in nanoseconds, monotonic per sensor
    pub timestamp_nanos: u64,
}

impl SensorSample {
    pub fn new(kind: SensorKind, values: Vec<f64>, timestamp_nanos: u64) -> Self {
        Self {
            kind,
            values,
            timestamp_nanos,
        }
    }

    pub fn accelerometer(timestamp_nanos: u64, values: [f64; 3]) -> Self {
        Self::new(SensorKind::Accelerometer, values.to_vec(), timestamp_nanos)
    }

    pub fn magnetic_field(timestamp_nanos: u64, values: [f64; 3]) -> Self {
        Self::new(SensorKind::MagneticField, values.to_vec(), timestamp_nanos)
    }

    pub fn orientation(timestamp_nanos: u64, azimuth_degrees: f64) -> Self {
        Self::new(
            SensorKind::Orientation,
            vec![azimuth_degrees, 0.0, 0.0],
            timestamp_nanos,
        )
    }

    /// The values as a 3-vector, if there are exactly three finite components
    pub fn vector3(&self) -> Option<[f64; SENSOR_VALUES_SIZE]> {
        match self.values.as_slice() {
            &[x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => Some([x, y, z]),
            _ => None,
        }
    }
}
