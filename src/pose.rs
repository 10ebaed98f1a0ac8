//! Pose and per-axis settings shared by the receivers and the processor.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static CLOCK_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds on a process-local monotonic clock.
///
/// The value is offset by one so a real reading is never `0`, which is the
/// "never set" sentinel used by [`Pose::timestamp_us`].
pub fn monotonic_micros() -> u64 {
    let epoch = CLOCK_EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64 + 1
}

/// A 3DOF head orientation sample in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    /// Capture time from [`monotonic_micros`]; `0` means unset.
    pub timestamp_us: u64,
}

impl Pose {
    /// Creates a pose stamped with the current monotonic time.
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self::with_timestamp(yaw, pitch, roll, monotonic_micros())
    }

    pub fn with_timestamp(yaw: f32, pitch: f32, roll: f32, timestamp_us: u64) -> Self {
        Self {
            yaw,
            pitch,
            roll,
            timestamp_us,
        }
    }

    /// Zero rotation stamped now.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_valid(&self) -> bool {
        self.timestamp_us != 0
    }

    /// True if the pose was captured less than `max_age` ago.
    pub fn is_recent(&self, max_age: Duration) -> bool {
        if !self.is_valid() {
            return false;
        }
        let elapsed_us = monotonic_micros().saturating_sub(self.timestamp_us);
        elapsed_us < max_age.as_micros() as u64
    }

    /// Component-wise difference, keeping this pose's timestamp.
    pub fn subtract_offset(&self, offset: &Pose) -> Pose {
        Pose::with_timestamp(
            self.yaw - offset.yaw,
            self.pitch - offset.pitch,
            self.roll - offset.roll,
            self.timestamp_us,
        )
    }

    pub fn rotation(&self) -> (f32, f32, f32) {
        (self.yaw, self.pitch, self.roll)
    }
}

/// Per-axis multipliers and inversion flags applied as the last pipeline step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivitySettings {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub invert_yaw: bool,
    pub invert_pitch: bool,
    pub invert_roll: bool,
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            yaw: 1.0,
            pitch: 1.0,
            roll: 1.0,
            invert_yaw: false,
            invert_pitch: false,
            invert_roll: false,
        }
    }
}

impl SensitivitySettings {
    /// Same multiplier on every axis, no inversion.
    pub fn uniform(sensitivity: f32) -> Self {
        Self {
            yaw: sensitivity,
            pitch: sensitivity,
            roll: sensitivity,
            ..Self::default()
        }
    }
}

/// Per-axis deadzone thresholds in degrees. `0.0` disables an axis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadzoneSettings {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl DeadzoneSettings {
    pub fn none() -> Self {
        Self::default()
    }

    /// Half a degree on every axis, enough to hide sensor noise at rest.
    pub fn recommended() -> Self {
        Self::uniform(0.5)
    }

    pub fn uniform(deadzone: f32) -> Self {
        Self {
            yaw: deadzone,
            pitch: deadzone,
            roll: deadzone,
        }
    }
}
