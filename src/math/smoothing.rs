//! Exponential smoothing with a frame-rate independent weight.
//!
//! The configured smoothing value (0..1) maps linearly onto a decay speed
//! between 50/s (0, fast) and 0.1/s (1, slow). The per-frame interpolation
//! weight is then `1 - exp(-speed * dt)`, so two 8 ms frames move the value
//! as far as one 16 ms frame would.

/// Minimum smoothing applied to samples from a non-loopback sender.
///
/// Network jitter on remote links shows up as visible stutter without it.
/// At 0.15 and 60 fps roughly 40% of the remaining distance is covered per
/// frame, settling in about 100-150 ms.
pub const REMOTE_CONNECTION_BASELINE: f64 = 0.15;

/// Below this the smoothing stage snaps straight to the target.
const SMOOTHING_BYPASS_THRESHOLD: f64 = 0.001;

const FASTEST_SPEED: f64 = 50.0;
const SLOWEST_SPEED: f64 = 0.1;

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolation weight for the current frame, in `(0, 1]`.
///
/// Returns `1.0` (snap) when `smoothing` is below 0.001 regardless of
/// `delta_time`.
pub fn calculate_smoothing_factor(smoothing: f64, delta_time: f64) -> f64 {
    if smoothing < SMOOTHING_BYPASS_THRESHOLD {
        return 1.0;
    }

    let speed = lerp(FASTEST_SPEED, SLOWEST_SPEED, smoothing);
    1.0 - (-speed * delta_time).exp()
}

/// Moves `current` toward `target` by one frame's worth of smoothing.
pub fn smooth(current: f64, target: f64, smoothing: f64, delta_time: f64) -> f64 {
    let t = calculate_smoothing_factor(smoothing, delta_time);
    current + (target - current) * t
}

/// Applies the remote baseline floor; local samples are returned unchanged.
pub fn effective_smoothing(base_smoothing: f64, is_remote_connection: bool) -> f64 {
    if is_remote_connection && base_smoothing < REMOTE_CONNECTION_BASELINE {
        return REMOTE_CONNECTION_BASELINE;
    }
    base_smoothing
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bypass_snaps_for_any_delta() {
        for dt in [0.0, 0.001, 0.016, 1.0, 100.0] {
            assert_eq!(calculate_smoothing_factor(0.0, dt), 1.0);
            assert_eq!(calculate_smoothing_factor(0.0009, dt), 1.0);
        }
    }

    #[test]
    fn test_factor_increases_with_delta_time() {
        for smoothing in [0.1, 0.5, 0.9] {
            let mut previous = 0.0;
            for dt in [0.001, 0.004, 0.016, 0.033, 0.1, 0.5] {
                let factor = calculate_smoothing_factor(smoothing, dt);
                assert!(factor > previous, "factor must grow with dt");
                assert!(factor < 1.0);
                previous = factor;
            }
        }
    }

    #[test]
    fn test_factor_tends_to_one() {
        let factor = calculate_smoothing_factor(0.5, 10.0);
        assert_abs_diff_eq!(factor, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_frame_rate_independence() {
        // Two half frames should land where one full frame does.
        let smoothing = 0.4;
        let one_step = smooth(0.0, 10.0, smoothing, 0.02);
        let half = smooth(0.0, 10.0, smoothing, 0.01);
        let two_steps = smooth(half, 10.0, smoothing, 0.01);
        assert_abs_diff_eq!(one_step, two_steps, epsilon = 1e-9);
    }

    #[test]
    fn test_effective_smoothing_remote_floor() {
        assert_eq!(effective_smoothing(0.05, true), 0.15);
        assert_eq!(effective_smoothing(0.2, true), 0.2);
        assert_eq!(effective_smoothing(0.05, false), 0.05);
        assert_eq!(effective_smoothing(0.0, false), 0.0);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(50.0, 0.1, 0.0), 50.0);
        assert_abs_diff_eq!(lerp(50.0, 0.1, 1.0), 0.1, epsilon = 1e-12);
        assert_eq!(lerp_f32(0.0, 4.0, 0.25), 1.0);
    }
}
