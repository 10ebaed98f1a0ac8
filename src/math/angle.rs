/// Wraps an angle in degrees into `[-180, 180]`.
///
/// Values already in range are returned unchanged, which covers nearly
/// every head-tracking sample.
pub fn normalize_angle(angle: f64) -> f64 {
    if (-180.0..=180.0).contains(&angle) {
        return angle;
    }

    let wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped < -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

pub fn normalize_angle_f32(angle: f32) -> f32 {
    if (-180.0..=180.0).contains(&angle) {
        return angle;
    }

    let wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped < -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in degrees.
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}
