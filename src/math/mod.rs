//! Scalar helpers used by the tracking pipeline.
//!
//! - [`angle`] - wrapping into ±180° and shortest angular distance
//! - [`deadzone`] - dead band suppression with continuous rescaling
//! - [`smoothing`] - frame-rate independent exponential smoothing
//!
//! Clamping and degree/radian conversion are plain `f64::clamp`,
//! `to_radians` and `to_degrees`.

pub mod angle;
pub mod deadzone;
pub mod smoothing;

pub use angle::{normalize_angle, normalize_angle_f32, shortest_angle_delta};
pub use deadzone::{apply_deadzone, apply_deadzone_f32};
pub use smoothing::{
    calculate_smoothing_factor, effective_smoothing, lerp, lerp_f32, smooth,
    REMOTE_CONNECTION_BASELINE,
};
