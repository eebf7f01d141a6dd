//! Prior residuals on poses and camera parameters.

use super::lit;
use super::reprojection::se3_parts;
use nalgebra::{DVectorView, RealField, SVector, Vector3};

/// Orientation prior: the world up direction, rotated into the camera frame,
/// should match `camera_up`.
///
/// Residual: `(R * world_up - camera_up) / sigma` where `R` is the
/// world-to-camera rotation of `pose`.
pub(crate) fn up_vector_residual_generic<T: RealField>(
    pose: DVectorView<'_, T>,
    world_up: [f64; 3],
    camera_up: [f64; 3],
    sigma: f64,
) -> SVector<T, 3> {
    let (rot, _) = se3_parts(pose);
    let up_w = Vector3::new(
        lit::<T>(world_up[0]),
        lit::<T>(world_up[1]),
        lit::<T>(world_up[2]),
    );
    let up_c = rot.transform_vector(&up_w);
    let inv = lit::<T>(1.0 / sigma);
    SVector::<T, 3>::new(
        (up_c.x.clone() - lit::<T>(camera_up[0])) * inv.clone(),
        (up_c.y.clone() - lit::<T>(camera_up[1])) * inv.clone(),
        (up_c.z.clone() - lit::<T>(camera_up[2])) * inv,
    )
}

/// Focal prior: `ln(f / f_prior) / sigma` for `fx` and `fy`.
pub(crate) fn focal_log_prior_generic<T: RealField>(
    intr: DVectorView<'_, T>,
    focal: [f64; 2],
    sigma: f64,
) -> SVector<T, 2> {
    let inv = lit::<T>(1.0 / sigma);
    SVector::<T, 2>::new(
        (intr[0].clone() / lit::<T>(focal[0])).ln() * inv.clone(),
        (intr[1].clone() / lit::<T>(focal[1])).ln() * inv,
    )
}

/// Principal point prior: `(c - c_prior) / sigma` in pixels.
pub(crate) fn principal_point_prior_generic<T: RealField>(
    intr: DVectorView<'_, T>,
    center: [f64; 2],
    sigma: f64,
) -> SVector<T, 2> {
    let inv = lit::<T>(1.0 / sigma);
    SVector::<T, 2>::new(
        (intr[2].clone() - lit::<T>(center[0])) * inv.clone(),
        (intr[3].clone() - lit::<T>(center[1])) * inv,
    )
}

/// Distortion prior: `(d_i - mean_i) / sigma_i` for each coefficient.
pub(crate) fn distortion_prior_generic<T: RealField>(
    dist: DVectorView<'_, T>,
    mean: [f64; 5],
    sigma: [f64; 5],
) -> SVector<T, 5> {
    SVector::<T, 5>::from_fn(|i, _| (dist[i].clone() - lit::<T>(mean[i])) / lit::<T>(sigma[i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dvector, DVector};
    use vslam_core::{Rot3, Vec3, WorldToCamera};

    use crate::params::pose_se3::pose_to_se3_dvec;

    #[test]
    fn up_vector_is_zero_for_aligned_rotation() {
        let pose = WorldToCamera::from_parts(
            Rot3::from_scaled_axis(Vec3::new(0.0, 0.7, 0.0)),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let v = pose_to_se3_dvec(&pose);
        let r = up_vector_residual_generic(v.as_view(), [0.0, -1.0, 0.0], [0.0, -1.0, 0.0], 1e-3);
        assert!(r.norm() < 1e-9, "r={r}");
    }

    #[test]
    fn up_vector_penalizes_roll() {
        let pose = WorldToCamera::from_parts(
            Rot3::from_scaled_axis(Vec3::new(0.0, 0.0, 0.01)),
            Vec3::zeros(),
        );
        let v = pose_to_se3_dvec(&pose);
        let r = up_vector_residual_generic(v.as_view(), [0.0, -1.0, 0.0], [0.0, -1.0, 0.0], 1e-3);
        // sin(0.01) / 1e-3 along x
        assert!((r.norm() - 10.0).abs() < 0.01, "r={r}");
    }

    #[test]
    fn intrinsics_priors_vanish_at_prior() {
        let intr: DVector<f64> = dvector![500.0, 510.0, 320.0, 240.0];
        let f = focal_log_prior_generic(intr.as_view(), [500.0, 510.0], 0.01);
        let c = principal_point_prior_generic(intr.as_view(), [320.0, 240.0], 6.4);
        assert!(f.norm() < 1e-12 && c.norm() < 1e-12);

        let shifted = principal_point_prior_generic(intr.as_view(), [313.6, 240.0], 6.4);
        assert!((shifted[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn distortion_prior_is_normalized() {
        let dist: DVector<f64> = dvector![0.1, 0.0, 0.0, 0.0, 0.0];
        let r = distortion_prior_generic(dist.as_view(), [0.0; 5], [0.05, 1.0, 1.0, 1.0, 1.0]);
        assert!((r[0] - 2.0).abs() < 1e-12);
        assert!(r.rows(1, 4).norm() < 1e-12);
    }
}
