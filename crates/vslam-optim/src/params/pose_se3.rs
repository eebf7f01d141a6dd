//! SE(3) parameter conversions for tiny-solver.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView, Quaternion, UnitQuaternion, Vector3};
use vslam_core::WorldToCamera;

pub const SE3_DIM: usize = 7;

/// Pack a world-to-camera pose as `[qx, qy, qz, qw, tx, ty, tz]`.
pub fn pose_to_se3_dvec(pose: &WorldToCamera) -> DVector<f64> {
    let q = pose.rotation().into_inner();
    let t = pose.translation();
    nalgebra::dvector![
        q.coords[0],
        q.coords[1],
        q.coords[2],
        q.coords[3],
        t.x,
        t.y,
        t.z
    ]
}

/// Unpack `[qx, qy, qz, qw, tx, ty, tz]` into a world-to-camera pose.
///
/// The quaternion is renormalized; a zero or non-finite block is an error.
pub fn se3_dvec_to_pose(v: DVectorView<'_, f64>) -> Result<WorldToCamera> {
    ensure!(
        v.len() == SE3_DIM,
        "expected se3 vector of length {}, got {}",
        SE3_DIM,
        v.len()
    );
    ensure!(
        v.iter().all(|x| x.is_finite()),
        "se3 vector has non-finite entries: {:?}",
        v.as_slice()
    );
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    ensure!(quat.norm() > 1e-12, "se3 vector has a zero quaternion");
    let rot = UnitQuaternion::from_quaternion(quat);
    Ok(WorldToCamera::from_parts(rot, Vector3::new(v[4], v[5], v[6])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vslam_core::{Rot3, Vec3};

    #[test]
    fn pack_unpack_preserves_pose() {
        let pose = WorldToCamera::from_parts(
            Rot3::from_scaled_axis(Vec3::new(0.1, -0.4, 0.2)),
            Vec3::new(-1.0, 0.5, 2.0),
        );
        let back = se3_dvec_to_pose(pose_to_se3_dvec(&pose).as_view()).unwrap();
        let (dr, dt) = pose.distance_to(&back);
        assert!(dr < 1e-12 && dt < 1e-12);
    }

    #[test]
    fn zero_quaternion_is_rejected() {
        let v = DVector::from_row_slice(&[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        assert!(se3_dvec_to_pose(v.as_view()).is_err());
    }
}
