//! Pose newtypes with an explicit transform direction.
//!
//! Every pose that crosses a crate boundary is a [`WorldToCamera`]:
//! `x_camera = R * x_world + t`. The inverse direction exists only as
//! [`CameraToWorld`], so mixing the two is a type error rather than a silent
//! convention mismatch.

use crate::{Iso3, Pt3, Real, Rot3, Vec3};
use nalgebra::Translation3;
use serde::{Deserialize, Serialize};

/// Rigid transform mapping world-frame points into the camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldToCamera(pub Iso3);

/// Rigid transform mapping camera-frame points into the world frame.
///
/// Its translation is the camera center in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraToWorld(pub Iso3);

impl WorldToCamera {
    pub fn identity() -> Self {
        Self(Iso3::identity())
    }

    pub fn from_parts(rotation: Rot3, translation: Vec3) -> Self {
        Self(Iso3::from_parts(Translation3::from(translation), rotation))
    }

    pub fn isometry(&self) -> &Iso3 {
        &self.0
    }

    pub fn rotation(&self) -> &Rot3 {
        &self.0.rotation
    }

    pub fn translation(&self) -> Vec3 {
        self.0.translation.vector
    }

    pub fn transform_point(&self, pw: &Pt3) -> Pt3 {
        self.0.transform_point(pw)
    }

    pub fn inverse(&self) -> CameraToWorld {
        CameraToWorld(self.0.inverse())
    }

    /// Camera center in world coordinates.
    pub fn center(&self) -> Pt3 {
        Pt3::from(self.inverse().0.translation.vector)
    }

    /// Rotation angle (radians) and translation distance to `other`.
    pub fn distance_to(&self, other: &WorldToCamera) -> (Real, Real) {
        let rot = self.rotation().angle_to(other.rotation());
        let trans = (self.translation() - other.translation()).norm();
        (rot, trans)
    }

    pub fn is_finite(&self) -> bool {
        let q = self.0.rotation.coords;
        let t = self.0.translation.vector;
        q.iter().chain(t.iter()).all(|v| v.is_finite())
    }
}

impl Default for WorldToCamera {
    fn default() -> Self {
        Self::identity()
    }
}

impl CameraToWorld {
    pub fn identity() -> Self {
        Self(Iso3::identity())
    }

    pub fn isometry(&self) -> &Iso3 {
        &self.0
    }

    pub fn transform_point(&self, pc: &Pt3) -> Pt3 {
        self.0.transform_point(pc)
    }

    pub fn inverse(&self) -> WorldToCamera {
        WorldToCamera(self.0.inverse())
    }
}

impl From<CameraToWorld> for WorldToCamera {
    fn from(c: CameraToWorld) -> Self {
        c.inverse()
    }
}

impl From<WorldToCamera> for CameraToWorld {
    fn from(w: WorldToCamera) -> Self {
        w.inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_inverse_translation() {
        let rot = Rot3::from_scaled_axis(Vec3::new(0.0, 0.3, 0.0));
        let pose = WorldToCamera::from_parts(rot, Vec3::new(0.5, -0.2, 1.0));
        let c = pose.center();
        let back = pose.transform_point(&c);
        assert!(back.coords.norm() < 1e-12);
    }

    #[test]
    fn conversions_are_inverse() {
        let rot = Rot3::from_scaled_axis(Vec3::new(0.1, -0.2, 0.05));
        let pose = WorldToCamera::from_parts(rot, Vec3::new(1.0, 2.0, 3.0));
        let c2w: CameraToWorld = pose.into();
        let back: WorldToCamera = c2w.into();
        let (dr, dt) = pose.distance_to(&back);
        assert!(dr < 1e-12 && dt < 1e-12);
    }
}
