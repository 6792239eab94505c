//! Fixed thresholds for accuracy and staleness gating
//!
//! These are deliberately not instance state: every navigator and sensor
//! fuser judges fixes and samples against the same limits.

/// Nanoseconds per millisecond.
pub const MILLI_IN_NANOS: u64 = 1_000_000;

/// Nanoseconds per microsecond.
pub const MICRO_IN_NANOS: u64 = 1_000;

/// Milliseconds per second.
pub const SECOND_IN_MILLIS: f64 = 1000.0;

/// Maximum horizontal accuracy radius (meters) for a fix to count as accurate.
pub const ACCURACY_LIMIT_M: f64 = 50.0;

/// Age after which a location fix is stale: 5 minutes.
pub const LOCATION_EXPIRE_MILLIS: u64 = 5 * 60 * 1000;

/// [`LOCATION_EXPIRE_MILLIS`] on the monotonic clock.
pub const LOCATION_EXPIRE_NANOS: u64 = LOCATION_EXPIRE_MILLIS * MILLI_IN_NANOS;

/// Age after which a received sensor sample is stale: 5 seconds.
pub const SENSOR_EXPIRE_NANOS: u64 = 5000 * MILLI_IN_NANOS;

/// Requested sensor sampling period, also the minimum spacing between
/// accepted samples of one sensor kind.
pub const SENSOR_UPDATE_INTERVAL_US: u32 = 200_000;

/// [`SENSOR_UPDATE_INTERVAL_US`] in nanoseconds.
pub const SENSOR_UPDATE_INTERVAL_NANOS: u64 = SENSOR_UPDATE_INTERVAL_US as u64 * MICRO_IN_NANOS;

/// Number of components of an accelerometer or magnetometer vector.
pub const SENSOR_VALUES_SIZE: usize = 3;

/// Low-pass alpha applied per axis to raw accelerometer and magnetometer vectors.
pub const LOW_PASS_ALPHA: f64 = 0.6;

/// Circular-average alpha folding a freshly computed azimuth into the heading.
/// Much heavier damping than [`LOW_PASS_ALPHA`]: the derived azimuth is noisy.
pub const AZIMUTH_ALPHA: f64 = 0.05;

/// Below this norm the gravity/geomagnetic cross product is degenerate
/// (free fall, or field parallel to gravity) and no rotation matrix exists.
pub const MIN_HORIZONTAL_FIELD_NORM: f64 = 0.1;

/// Mean Earth radius in meters, used by the great-circle formulas.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;
