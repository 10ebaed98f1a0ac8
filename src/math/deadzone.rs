/// Suppresses values inside the dead band and shifts the rest toward zero.
///
/// Output is continuous at the threshold: `|v| <= t` maps to `0` and
/// `|v| > t` maps to `sign(v) * (|v| - t)`. A non-positive threshold
/// disables the deadzone.
pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    if deadzone <= 0.0 {
        return value;
    }

    let abs_value = value.abs();
    if abs_value <= deadzone {
        return 0.0;
    }

    let sign = if value >= 0.0 { 1.0 } else { -1.0 };
    sign * (abs_value - deadzone)
}

pub fn apply_deadzone_f32(value: f32, deadzone: f32) -> f32 {
    if deadzone <= 0.0 {
        return value;
    }

    let abs_value = value.abs();
    if abs_value <= deadzone {
        return 0.0;
    }

    let sign = if value >= 0.0 { 1.0 } else { -1.0 };
    sign * (abs_value - deadzone)
}
