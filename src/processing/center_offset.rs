use crate::pose::Pose;

/// Reference pose subtracted from every following sample.
#[derive(Clone, Debug, Default)]
pub struct CenterOffsetManager {
    center_offset: Pose,
    has_valid_center: bool,
}

impl CenterOffsetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn center_offset(&self) -> &Pose {
        &self.center_offset
    }

    pub fn has_valid_center(&self) -> bool {
        self.has_valid_center
    }

    /// Uses the pose's angles as the new zero. The timestamp is dropped, the
    /// center is a delta rather than a timed sample.
    pub fn set_center(&mut self, pose: &Pose) {
        self.set_center_components(pose.yaw, pose.pitch, pose.roll);
    }

    pub fn set_center_components(&mut self, yaw: f32, pitch: f32, roll: f32) {
        self.center_offset = Pose::with_timestamp(yaw, pitch, roll, 0);
        self.has_valid_center = true;
    }

    /// Subtracts the center in place; leaves the values alone if unset.
    pub fn apply_offset(&self, yaw: &mut f32, pitch: &mut f32, roll: &mut f32) {
        if !self.has_valid_center {
            return;
        }
        *yaw -= self.center_offset.yaw;
        *pitch -= self.center_offset.pitch;
        *roll -= self.center_offset.roll;
    }

    pub fn reset(&mut self) {
        self.center_offset = Pose::default();
        self.has_valid_center = false;
    }
}
