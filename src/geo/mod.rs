pub mod cardinal;
pub mod fix;

pub use cardinal::CardinalDirection;
pub use fix::GeoFix;
