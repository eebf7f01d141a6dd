//! Synthetic tracking scenes.
//!
//! World convention used here: the camera looks along world +Z with image
//! rows growing along world +Y, so trajectories that rotate only about the
//! Y axis keep the camera's vertical axis aligned with the world vertical.

use super::noise::{mix_key, unit_f64, UniformPixelNoise};
use crate::{
    Camera, Correspondence, Landmark, LandmarkId, Observation, Pt3, Real, Rot3, Vec3,
    WorldToCamera,
};

/// Default feature scale (pixels) attached to synthetic observations.
pub const DEFAULT_FEATURE_SCALE: Real = 1.0;

/// `n` landmarks spread over a box in front of the world origin
/// (`x ∈ [-3, 3]`, `y ∈ [-2, 2]`, `z ∈ [4, 10]`), ids `0..n`.
pub fn landmark_cloud(n: usize, seed: u64) -> Vec<Landmark> {
    (0..n)
        .map(|i| {
            let x = -3.0 + 6.0 * unit_f64(mix_key(seed, i, 0));
            let y = -2.0 + 4.0 * unit_f64(mix_key(seed, i, 1));
            let z = 4.0 + 6.0 * unit_f64(mix_key(seed, i, 2));
            Landmark::new(LandmarkId(i as u64), Pt3::new(x, y, z))
        })
        .collect()
}

/// `n` world-to-camera poses: yaw about +Y growing by `yaw_step_rad` and the
/// camera center sliding along world +X by `step` per frame.
pub fn yaw_trajectory(n: usize, yaw_step_rad: Real, step: Real) -> Vec<WorldToCamera> {
    (0..n)
        .map(|i| {
            let rotation = Rot3::from_scaled_axis(Vec3::y() * (yaw_step_rad * i as Real));
            let center = Vec3::new(step * i as Real, 0.0, 0.0);
            WorldToCamera::from_parts(rotation, -(rotation * center))
        })
        .collect()
}

/// Apply a fixed perturbation to `pose`: a rotation of `rot_rad` about a
/// skewed axis followed by a translation offset of norm `trans`.
pub fn perturb(pose: &WorldToCamera, rot_rad: Real, trans: Real) -> WorldToCamera {
    let axis = Vec3::new(0.3, 1.0, -0.2).normalize();
    let dir = Vec3::new(1.0, -0.5, 0.7).normalize();
    let rotation = Rot3::from_scaled_axis(axis * rot_rad) * pose.rotation();
    WorldToCamera::from_parts(rotation, pose.translation() + dir * trans)
}

/// Project every landmark visible in `camera` at `pose`.
///
/// Landmarks behind the camera or outside the image are skipped. Observation
/// order follows landmark order.
pub fn observe(
    camera: &Camera,
    pose: &WorldToCamera,
    landmarks: &[Landmark],
    noise: Option<&UniformPixelNoise>,
    frame_idx: usize,
) -> Vec<Correspondence> {
    landmarks
        .iter()
        .enumerate()
        .filter_map(|(idx, lm)| {
            let uv = camera.project_world(pose, &lm.position)?;
            if uv.x < 0.0
                || uv.y < 0.0
                || uv.x >= camera.width as Real
                || uv.y >= camera.height as Real
            {
                return None;
            }
            let uv = noise.map_or(uv, |n| n.apply(frame_idx, idx, uv));
            Some(Correspondence::new(
                lm,
                Observation::new(uv, DEFAULT_FEATURE_SCALE),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PinholeIntrinsics;

    fn camera() -> Camera {
        Camera::new("cam0", 640, 480, PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0))
    }

    #[test]
    fn cloud_is_deterministic_and_in_front() {
        let a = landmark_cloud(50, 3);
        let b = landmark_cloud(50, 3);
        assert_eq!(a, b);
        assert!(a.iter().all(|l| l.position.z >= 4.0));
    }

    #[test]
    fn trajectory_centers_follow_x() {
        let poses = yaw_trajectory(3, 0.05, 0.2);
        for (i, p) in poses.iter().enumerate() {
            let c = p.center();
            assert!((c.x - 0.2 * i as f64).abs() < 1e-12);
            assert!(c.y.abs() < 1e-12 && c.z.abs() < 1e-12);
        }
    }

    #[test]
    fn observed_points_reproject_exactly() {
        let cam = camera();
        let lms = landmark_cloud(300, 11);
        let pose = yaw_trajectory(2, 0.03, 0.1)[1];
        let corrs = observe(&cam, &pose, &lms, None, 0);
        assert!(corrs.len() > 150, "visible={}", corrs.len());
        for c in &corrs {
            let uv = cam.project_world(&pose, &c.point).unwrap();
            assert!((uv - c.observation.uv).norm() < 1e-12);
        }
    }

    #[test]
    fn perturb_moves_pose() {
        let pose = WorldToCamera::identity();
        let p = perturb(&pose, 0.05, 0.1);
        let (dr, dt) = pose.distance_to(&p);
        assert!((dr - 0.05).abs() < 1e-9);
        assert!((dt - 0.1).abs() < 1e-9);
    }
}
