pub mod navigator;

pub use navigator::{DIR_ZERO, DIST_ZERO, Navigator, SPEED_ZERO};
