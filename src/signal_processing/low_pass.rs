use crate::error::{NavError, Result};

/// Exponential low pass filter step
///
/// Moves `previous` towards `new` by the fraction `alpha`, damping high
/// frequency changes and reducing the jumpiness of the signal.
///
/// # Arguments
/// * `previous` - Previously filtered value
/// * `new` - New raw value
/// * `alpha` - Smoothing factor (0 keeps `previous`, 1 takes `new`)
///
/// # Errors
/// `NavError::InvalidArgument` if `alpha` is outside [0, 1].
pub fn filter_value(previous: f64, new: f64, alpha: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(NavError::InvalidArgument(format!(
            "alpha {} is not in range 0.0 .. 1.0",
            alpha
        )));
    }

    Ok(previous + alpha * (new - previous))
}

/// Low pass filter a set of unrelated values in parallel
///
/// Each index is a separate signal (e.g. the x, y and z axis of a sensor),
/// not consecutive samples of one signal.
///
/// When there is no previous set (`None` or empty) the new values are
/// returned unchanged, so the first sample is not smoothed towards zero.
///
/// # Errors
/// `NavError::InvalidArgument` if `new` is empty, if both sets are present
/// with different lengths, or if `alpha` is outside [0, 1].
pub fn filter_value_set(previous: Option<&[f64]>, new: &[f64], alpha: f64) -> Result<Vec<f64>> {
    if new.is_empty() {
        return Err(NavError::InvalidArgument(
            "new value set should not be empty".to_string(),
        ));
    }

    let previous = match previous {
        Some(previous) if !previous.is_empty() => previous,
        _ => return Ok(new.to_vec()),
    };

    if previous.len() != new.len() {
        return Err(NavError::InvalidArgument(format!(
            "previous value set (length = {}) should have the same size as new value set (length = {})",
            previous.len(),
            new.len()
        )));
    }

    previous
        .iter()
        .zip(new)
        .map(|(&p, &n)| filter_value(p, n, alpha))
        .collect()
}
