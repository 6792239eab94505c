pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod geo;
pub mod navigation;
pub mod output;
pub mod processing;
pub mod sensors;
pub mod signal_processing;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{NavConfig, OrientationSensorMode, SensorConfig};
pub use error::{NavError, Result};
pub use geo::{CardinalDirection, GeoFix};
pub use navigation::Navigator;
pub use processing::{NavEvent, NavigationProcessor, NavigationSnapshot};
pub use sensors::{SensorOrientation, SensorSample};
