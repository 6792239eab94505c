use super::low_pass::filter_value;
use super::math::{CIRCLE_FULL, normalize_angle};
use crate::error::Result;

/// Half-width of the window on either side of the 0°/360° seam in which a
/// pair of angles is checked for a short arc that crosses the seam.
pub const CROSS_WINDOW: f64 = 180.0;

/// Low pass filter an angle that wraps at 360°
///
/// A plain exponential filter between 358° and 2° would drag the result
/// through 180°. When the short arc between `previous` and `new` crosses the
/// seam, the smaller of the two is shifted up by 360° first, so the filter
/// moves along the short arc. The result is normalized to [0, 360).
///
/// Inputs may be unnormalized (e.g. 480° for 120°).
///
/// # Errors
/// `NavError::InvalidArgument` if `alpha` is outside [0, 1].
pub fn average_value(previous: f64, new: f64, alpha: f64) -> Result<f64> {
    let near_zero = |angle: f64| angle > 0.0 && angle < CROSS_WINDOW;
    let near_full = |angle: f64| angle > CIRCLE_FULL - CROSS_WINDOW && angle < CIRCLE_FULL;

    let mut previous = previous;
    let mut new = new;

    if near_zero(new) && near_full(previous) && (new + CIRCLE_FULL - previous).abs() < CROSS_WINDOW
    {
        new += CIRCLE_FULL;
    } else if near_full(new)
        && near_zero(previous)
        && (previous + CIRCLE_FULL - new).abs() < CROSS_WINDOW
    {
        previous += CIRCLE_FULL;
    }

    Ok(normalize_angle(filter_value(previous, new, alpha)?))
}
