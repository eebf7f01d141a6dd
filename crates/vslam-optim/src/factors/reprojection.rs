//! Landmark reprojection residual.

use super::lit;
use nalgebra::{DVectorView, Quaternion, RealField, SVector, UnitQuaternion, Vector3};

/// Unpack an SE3 block `[qx, qy, qz, qw, tx, ty, tz]`.
pub(crate) fn se3_parts<T: RealField>(
    pose: DVectorView<'_, T>,
) -> (UnitQuaternion<T>, Vector3<T>) {
    debug_assert!(pose.len() == 7, "pose must have 7 params");
    let quat = Quaternion::new(
        pose[3].clone(),
        pose[0].clone(),
        pose[1].clone(),
        pose[2].clone(),
    );
    let rot = UnitQuaternion::from_quaternion(quat);
    let t = Vector3::new(pose[4].clone(), pose[5].clone(), pose[6].clone());
    (rot, t)
}

/// Apply Brown-Conrady distortion to normalized coordinates.
fn distort_brown_conrady<T: RealField>(x: T, y: T, dist: DVectorView<'_, T>) -> (T, T) {
    let k1 = dist[0].clone();
    let k2 = dist[1].clone();
    let k3 = dist[2].clone();
    let p1 = dist[3].clone();
    let p2 = dist[4].clone();

    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();

    let radial = T::one() + k1 * r2.clone() + k2 * r4 + k3 * r6;

    let two = lit::<T>(2.0);
    let xy = x.clone() * y.clone();
    let x_tan = two.clone() * p1.clone() * xy.clone()
        + p2.clone() * (r2.clone() + two.clone() * x.clone() * x.clone());
    let y_tan = p1 * (r2 + two.clone() * y.clone() * y.clone()) + two * p2 * xy;

    (x * radial.clone() + x_tan, y * radial + y_tan)
}

/// Project a camera-frame point into pixels.
pub(crate) fn project_pinhole4_dist5<T: RealField>(
    intr: DVectorView<'_, T>,
    dist: DVectorView<'_, T>,
    pc: &Vector3<T>,
) -> (T, T) {
    debug_assert!(intr.len() >= 4, "intrinsics must have 4 params");
    debug_assert!(dist.len() >= 5, "distortion must have 5 params");
    let x = pc.x.clone() / pc.z.clone();
    let y = pc.y.clone() / pc.z.clone();
    let (xd, yd) = distort_brown_conrady(x, y, dist);
    (
        intr[0].clone() * xd + intr[2].clone(),
        intr[1].clone() * yd + intr[3].clone(),
    )
}

/// Reprojection residual for a landmark seen by a world-to-camera pose.
///
/// # Parameters
/// - `intr`: `[fx, fy, cx, cy]`
/// - `dist`: `[k1, k2, k3, p1, p2]`
/// - `pose`: world-to-camera SE3 `[qx, qy, qz, qw, tx, ty, tz]`
/// - `point`: landmark `[x, y, z]` in world coordinates
/// - `uv`: measured pixel
/// - `w`: observation weight, `1 / scale^2`
///
/// The residual is `(uv - projection) * sqrt(w)`.
pub(crate) fn reproj_residual_landmark_generic<T: RealField>(
    intr: DVectorView<'_, T>,
    dist: DVectorView<'_, T>,
    pose: DVectorView<'_, T>,
    point: DVectorView<'_, T>,
    uv: [f64; 2],
    w: f64,
) -> SVector<T, 2> {
    debug_assert!(point.len() == 3, "point must have 3 params");
    let (rot, t) = se3_parts(pose);
    let pw = Vector3::new(point[0].clone(), point[1].clone(), point[2].clone());
    let pc = rot.transform_vector(&pw) + t;

    let (u, v) = project_pinhole4_dist5(intr, dist, &pc);
    let sqrt_w = lit::<T>(w.sqrt());
    SVector::<T, 2>::new(
        (lit::<T>(uv[0]) - u) * sqrt_w.clone(),
        (lit::<T>(uv[1]) - v) * sqrt_w,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dvector, DVector};
    use vslam_core::{BrownConrady5, Camera, PinholeIntrinsics, Pt3, Rot3, Vec3, WorldToCamera};

    use crate::params::pose_se3::pose_to_se3_dvec;

    #[test]
    fn residual_matches_core_camera_projection() {
        let cam = Camera::new("c", 640, 480, PinholeIntrinsics::new(520.0, 515.0, 321.0, 239.0))
            .with_distortion(BrownConrady5 {
                k1: -0.08,
                k2: 0.01,
                k3: 0.001,
                p1: 0.0007,
                p2: -0.0004,
            });
        let pose = WorldToCamera::from_parts(
            Rot3::from_scaled_axis(Vec3::new(0.02, 0.1, -0.01)),
            Vec3::new(0.2, -0.1, 0.3),
        );
        let pw = Pt3::new(0.4, -0.3, 5.0);
        let uv = cam.project_world(&pose, &pw).unwrap();

        let intr = DVector::from_row_slice(&cam.intrinsics.to_array());
        let dist = DVector::from_row_slice(&cam.distortion.to_array());
        let pose_v = pose_to_se3_dvec(&pose);
        let point = dvector![pw.x, pw.y, pw.z];

        let r = reproj_residual_landmark_generic(
            intr.as_view(),
            dist.as_view(),
            pose_v.as_view(),
            point.as_view(),
            [uv.x, uv.y],
            1.0,
        );
        assert!(r.norm() < 1e-9, "residual={r}");

        let r_shift = reproj_residual_landmark_generic(
            intr.as_view(),
            dist.as_view(),
            pose_v.as_view(),
            point.as_view(),
            [uv.x + 2.0, uv.y],
            0.25,
        );
        assert!((r_shift[0] - 1.0).abs() < 1e-9);
    }
}
