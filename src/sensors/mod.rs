//! Orientation sensors: samples, platform subscription and heading fusion

pub mod orientation;
pub mod sample;
pub mod source;

pub use orientation::{ListenerId, OrientationListener, SensorOrientation};
pub use sample::{SensorKind, SensorSample};
pub use source::{ReplaySensorSource, SensorAvailability, SensorSet, SensorSource, select_sensor_set};
