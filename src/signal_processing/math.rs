use crate::constants::MIN_HORIZONTAL_FIELD_NORM;

/// Full circle in degrees
pub const CIRCLE_FULL: f64 = 360.0;

/// Half circle in degrees
pub const CIRCLE_HALF: f64 = 180.0;

/// Normalize an angle in degrees to the range [0, 360)
pub fn normalize_angle(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(CIRCLE_FULL);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if normalized >= CIRCLE_FULL {
        0.0
    } else {
        normalized
    }
}

/// Signed shortest-arc difference `a - b` in degrees, in (-180, 180]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let diff = normalize_angle(a - b);
    if diff > CIRCLE_HALF {
        diff - CIRCLE_FULL
    } else {
        diff
    }
}

/// Row-major 3x3 rotation matrix from device coordinates to the world frame
/// (East, North, Up).
pub type RotationMatrix = [f64; 9];

/// Compute the device rotation matrix from a gravity vector and a geomagnetic
/// vector, both in device coordinates.
///
/// Returns `None` when the vectors cannot define a frame: the device is in
/// free fall, or the field is (close to) parallel to gravity.
pub fn rotation_matrix(gravity: &[f64; 3], geomagnetic: &[f64; 3]) -> Option<RotationMatrix> {
    let [ax, ay, az] = *gravity;
    let [ex, ey, ez] = *geomagnetic;

    // East = geomagnetic x gravity
    let mut hx = ey * az - ez * ay;
    let mut hy = ez * ax - ex * az;
    let mut hz = ex * ay - ey * ax;
    let norm_h = (hx * hx + hy * hy + hz * hz).sqrt();
    if norm_h < MIN_HORIZONTAL_FIELD_NORM {
        return None;
    }

    let norm_a = (ax * ax + ay * ay + az * az).sqrt();
    if norm_a <= f64::EPSILON {
        return None;
    }

    hx /= norm_h;
    hy /= norm_h;
    hz /= norm_h;
    let (ax, ay, az) = (ax / norm_a, ay / norm_a, az / norm_a);

    // North = gravity x East
    let mx = ay * hz - az * hy;
    let my = az * hx - ax * hz;
    let mz = ax * hy - ay * hx;

    Some([hx, hy, hz, mx, my, mz, ax, ay, az])
}

/// Extract (azimuth, pitch, roll) in radians from a rotation matrix.
///
/// Azimuth is the rotation around the down axis, 0 when the device's y axis
/// points to magnetic north, positive towards east. Range (-PI, PI].
pub fn orientation_angles(r: &RotationMatrix) -> [f64; 3] {
    let azimuth = r[1].atan2(r[4]);
    let pitch = (-r[7]).clamp(-1.0, 1.0).asin();
    let roll = (-r[6]).atan2(r[8]);
    [azimuth, pitch, roll]
}

/// Compass azimuth in degrees [0, 360) for a rotation matrix
pub fn azimuth_degrees(r: &RotationMatrix) -> f64 {
    normalize_angle(orientation_angles(r)[0].to_degrees())
}
