use super::center_offset::CenterOffsetManager;
use crate::math::{apply_deadzone_f32, calculate_smoothing_factor, effective_smoothing};
use crate::pose::{DeadzoneSettings, Pose, SensitivitySettings};
use tracing::debug;

/// Stateful offset → deadzone → smoothing → sensitivity pipeline.
///
/// Driven by a single caller once per frame. The smoothing accumulator is
/// kept in `f64` so long sessions at high frame rates do not drift.
#[derive(Clone, Debug, Default)]
pub struct TrackingProcessor {
    center_manager: CenterOffsetManager,

    smoothed_yaw: f64,
    smoothed_pitch: f64,
    smoothed_roll: f64,
    has_smoothed_value: bool,

    sensitivity: SensitivitySettings,
    deadzone: DeadzoneSettings,
    smoothing: f32,
}

impl TrackingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one frame.
    ///
    /// `delta_time` is the time since the previous call in seconds. The
    /// first call after construction or [`reset`](Self::reset), and any call
    /// with a zero, negative or non-finite delta, snaps to the target instead
    /// of interpolating.
    pub fn process(
        &mut self,
        yaw: f32,
        pitch: f32,
        roll: f32,
        is_remote_connection: bool,
        delta_time: f32,
    ) -> Pose {
        let (mut yaw, mut pitch, mut roll) = (yaw, pitch, roll);

        self.center_manager
            .apply_offset(&mut yaw, &mut pitch, &mut roll);

        let yaw = apply_deadzone_f32(yaw, self.deadzone.yaw) as f64;
        let pitch = apply_deadzone_f32(pitch, self.deadzone.pitch) as f64;
        let roll = apply_deadzone_f32(roll, self.deadzone.roll) as f64;

        let snap = !self.has_smoothed_value || !(delta_time.is_finite() && delta_time > 0.0);
        if snap {
            self.smoothed_yaw = yaw;
            self.smoothed_pitch = pitch;
            self.smoothed_roll = roll;
            self.has_smoothed_value = true;
        } else {
            let smoothing = effective_smoothing(self.smoothing as f64, is_remote_connection);
            let t = calculate_smoothing_factor(smoothing, delta_time as f64);
            self.smoothed_yaw += (yaw - self.smoothed_yaw) * t;
            self.smoothed_pitch += (pitch - self.smoothed_pitch) * t;
            self.smoothed_roll += (roll - self.smoothed_roll) * t;
        }

        let mut out_yaw = self.smoothed_yaw as f32 * self.sensitivity.yaw;
        let mut out_pitch = self.smoothed_pitch as f32 * self.sensitivity.pitch;
        let mut out_roll = self.smoothed_roll as f32 * self.sensitivity.roll;

        if self.sensitivity.invert_yaw {
            out_yaw = -out_yaw;
        }
        if self.sensitivity.invert_pitch {
            out_pitch = -out_pitch;
        }
        if self.sensitivity.invert_roll {
            out_roll = -out_roll;
        }

        Pose::new(out_yaw, out_pitch, out_roll)
    }

    /// Makes the current smoothed (pre-sensitivity) pose the new zero.
    ///
    /// The accumulator is left as is, so smoothing continues from the same
    /// value on the next frame. Compare [`recenter_to`](Self::recenter_to).
    pub fn recenter(&mut self) {
        self.center_manager.set_center_components(
            self.smoothed_yaw as f32,
            self.smoothed_pitch as f32,
            self.smoothed_roll as f32,
        );
        debug!(
            "Processor recentered at smoothed ({:.2}, {:.2}, {:.2})",
            self.smoothed_yaw, self.smoothed_pitch, self.smoothed_roll
        );
    }

    /// Uses an explicit center and zeroes the accumulator.
    ///
    /// Unlike [`recenter`](Self::recenter) this also restarts smoothing
    /// from zero.
    pub fn recenter_to(&mut self, yaw: f32, pitch: f32, roll: f32) {
        self.center_manager.set_center_components(yaw, pitch, roll);
        self.smoothed_yaw = 0.0;
        self.smoothed_pitch = 0.0;
        self.smoothed_roll = 0.0;
    }

    /// Clears center and accumulator; the next call snaps.
    pub fn reset(&mut self) {
        self.center_manager.reset();
        self.smoothed_yaw = 0.0;
        self.smoothed_pitch = 0.0;
        self.smoothed_roll = 0.0;
        self.has_smoothed_value = false;
    }

    pub fn set_sensitivity(&mut self, sensitivity: SensitivitySettings) {
        self.sensitivity = sensitivity;
    }

    pub fn set_deadzone(&mut self, deadzone: DeadzoneSettings) {
        self.deadzone = deadzone;
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing;
    }

    pub fn sensitivity(&self) -> &SensitivitySettings {
        &self.sensitivity
    }

    pub fn deadzone(&self) -> &DeadzoneSettings {
        &self.deadzone
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn center_manager(&self) -> &CenterOffsetManager {
        &self.center_manager
    }

    pub fn center_manager_mut(&mut self) -> &mut CenterOffsetManager {
        &mut self.center_manager
    }

    pub fn smoothed_rotation(&self) -> (f32, f32, f32) {
        (
            self.smoothed_yaw as f32,
            self.smoothed_pitch as f32,
            self.smoothed_roll as f32,
        )
    }
}
