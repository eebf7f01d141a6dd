//! Constant-motion pose prediction.

use vslam_core::WorldToCamera;

/// Constant motion model on world-to-camera poses.
///
/// The relative motion between the last two poses, `T_k * T_{k-1}^-1`, is
/// assumed to repeat: `predict = (T_k * T_{k-1}^-1) * T_k`.
#[derive(Debug, Clone, Default)]
pub struct ConstantMotionModel {
    prev: Option<WorldToCamera>,
    last: Option<WorldToCamera>,
}

impl ConstantMotionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pose of a newly tracked frame.
    pub fn update(&mut self, pose: &WorldToCamera) {
        self.prev = self.last.take();
        self.last = Some(*pose);
    }

    /// Predicted pose of the next frame.
    ///
    /// With one recorded pose this is that pose; with none it is `None`.
    pub fn predict(&self) -> Option<WorldToCamera> {
        match (&self.prev, &self.last) {
            (Some(prev), Some(last)) => {
                let delta = last.isometry() * prev.isometry().inverse();
                Some(WorldToCamera(delta * last.isometry()))
            }
            (None, Some(last)) => Some(*last),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.last = None;
    }
}
