use crate::{BrownConrady5, PinholeIntrinsics, Pt3, Real, Vec2, WorldToCamera};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Minimum camera-frame depth for a point to be projectable.
pub const MIN_DEPTH: Real = 1e-9;

/// Calibrated monocular camera: pinhole intrinsics, Brown-Conrady distortion
/// and the image size the intrinsics refer to.
///
/// Cameras are owned by the map; tracking borrows them read-only and returns
/// an updated copy only when intrinsics were optimized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub intrinsics: PinholeIntrinsics,
    #[serde(default)]
    pub distortion: BrownConrady5,
}

impl Camera {
    /// Create a distortion-free camera.
    pub fn new(id: impl Into<String>, width: u32, height: u32, intrinsics: PinholeIntrinsics) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            intrinsics,
            distortion: BrownConrady5::default(),
        }
    }

    pub fn with_distortion(mut self, distortion: BrownConrady5) -> Self {
        self.distortion = distortion;
        self
    }

    /// Largest image dimension in pixels, used to normalize principal point priors.
    pub fn max_dimension(&self) -> Real {
        self.width.max(self.height) as Real
    }

    /// Check that the model can be used for projection.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "camera {} has empty image size {}x{}",
            self.id,
            self.width,
            self.height
        );
        ensure!(
            self.intrinsics.is_valid(),
            "camera {} has invalid intrinsics {:?}",
            self.id,
            self.intrinsics
        );
        ensure!(
            self.distortion.to_array().iter().all(|c| c.is_finite()),
            "camera {} has non-finite distortion",
            self.id
        );
        Ok(())
    }

    /// Project a camera-frame point into pixels.
    ///
    /// Returns `None` for points at or behind the image plane.
    pub fn project_point_c(&self, pc: &Pt3) -> Option<Vec2> {
        if pc.z <= MIN_DEPTH {
            return None;
        }
        let n = Vec2::new(pc.x / pc.z, pc.y / pc.z);
        let d = self.distortion.distort(&n);
        Some(self.intrinsics.sensor_to_pixel(&d))
    }

    /// Project a world point through `pose` into pixels.
    pub fn project_world(&self, pose: &WorldToCamera, pw: &Pt3) -> Option<Vec2> {
        self.project_point_c(&pose.transform_point(pw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new("cam0", 640, 480, PinholeIntrinsics::new(500.0, 505.0, 320.0, 240.0))
            .with_distortion(BrownConrady5 {
                k1: -0.05,
                k2: 0.002,
                k3: 0.0,
                p1: 0.0005,
                p2: -0.0003,
            })
    }

    #[test]
    fn optical_axis_projects_to_principal_point() {
        let cam = camera();
        let px = cam.project_point_c(&Pt3::new(0.0, 0.0, 3.0)).unwrap();
        assert_eq!(px, Vec2::new(320.0, 240.0));
    }

    #[test]
    fn points_behind_camera_are_rejected() {
        let cam = camera();
        assert!(cam.project_point_c(&Pt3::new(0.0, 0.0, -1.0)).is_none());
        assert!(cam.project_point_c(&Pt3::new(0.1, 0.0, 0.0)).is_none());
    }

    #[test]
    fn validate_rejects_bad_focal() {
        let mut cam = camera();
        cam.validate().unwrap();
        cam.intrinsics.fx = 0.0;
        assert!(cam.validate().is_err());
    }

    #[test]
    fn camera_json_defaults_distortion() {
        let json = r#"{"id":"c","width":10,"height":20,"intrinsics":{"fx":1.0,"fy":1.0,"cx":5.0,"cy":10.0}}"#;
        let cam: Camera = serde_json::from_str(json).unwrap();
        assert_eq!(cam.distortion, BrownConrady5::default());
        assert_eq!(cam.max_dimension(), 20.0);
    }
}
