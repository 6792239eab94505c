pub mod circular_average;
pub mod low_pass;
pub mod math;

pub use circular_average::{CROSS_WINDOW, average_value};
pub use low_pass::{filter_value, filter_value_set};
pub use math::{angle_difference, azimuth_degrees, normalize_angle, rotation_matrix};
