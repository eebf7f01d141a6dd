//! Single-frame pose refinement against fixed landmarks.
//!
//! The problem has one camera (intrinsics + distortion, fixed unless
//! requested otherwise), one world-to-camera pose, and one fixed 3D block per
//! landmark. Each landmark contributes one robustified reprojection residual
//! weighted by its feature scale. An up-vector prior keeps the pose upright
//! when correspondences are weak, and intrinsics priors anchor the camera
//! when it is free.

use crate::backend::{solve_with_backend, BackendKind, BackendSolveOptions, LinearSolverKind};
use crate::ir::{FactorKind, FixedMask, ManifoldKind, ProblemIR, RobustLoss};
use crate::params::camera::{camera_from_blocks, distortion_to_dvec, intrinsics_to_dvec};
use crate::params::pose_se3::{pose_to_se3_dvec, se3_dvec_to_pose};
use anyhow::{anyhow, ensure, Result};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use vslam_core::{
    median, split_correspondences, Camera, Correspondence, Observation, Pt3, Real, Vec3,
    WorldToCamera,
};

/// Iteration cap for a single refinement.
pub const MAX_REFINE_ITERATIONS: usize = 50;

/// Name of the pose block in the refinement IR.
pub const POSE_BLOCK: &str = "shot/0";

/// Errors reported by [`refine_pose`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefineError {
    #[error("point/observation count mismatch: {points} points vs {observations} observations")]
    ShapeMismatch { points: usize, observations: usize },
    #[error("no correspondences to refine against")]
    NoCorrespondences,
    #[error("invalid refinement input: {0}")]
    InvalidInput(String),
    #[error("refinement failed: {0}")]
    Solver(String),
}

/// Soft prior aligning the world up direction with a camera-frame direction.
///
/// Both vectors are unit length. `world_up` is expressed in the world frame,
/// `camera_up` in the camera frame of the pose being refined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpVectorPrior {
    pub world_up: [Real; 3],
    pub camera_up: [Real; 3],
    pub sigma: Real,
}

impl Default for UpVectorPrior {
    /// Camera image rows grow along world +Y, so "up" is -Y in both frames.
    fn default() -> Self {
        Self {
            world_up: [0.0, -1.0, 0.0],
            camera_up: [0.0, -1.0, 0.0],
            sigma: 1e-3,
        }
    }
}

/// Standard deviations of the intrinsics priors.
///
/// Focal is a log-ratio SD, principal point is relative to the largest image
/// dimension, distortion SDs are absolute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsPriors {
    pub focal_sd: Real,
    pub principal_point_sd: Real,
    pub k1_sd: Real,
    pub k2_sd: Real,
    pub k3_sd: Real,
    pub p1_sd: Real,
    pub p2_sd: Real,
}

impl Default for IntrinsicsPriors {
    fn default() -> Self {
        Self {
            focal_sd: 0.01,
            principal_point_sd: 0.01,
            k1_sd: 0.01,
            k2_sd: 0.01,
            k3_sd: 0.01,
            p1_sd: 0.01,
            p2_sd: 0.01,
        }
    }
}

impl IntrinsicsPriors {
    fn distortion_sd(&self) -> [Real; 5] {
        [self.k1_sd, self.k2_sd, self.k3_sd, self.p1_sd, self.p2_sd]
    }
}

/// Options for [`refine_pose`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseRefineOptions {
    /// Optimize intrinsics and distortion instead of holding them fixed.
    pub optimize_intrinsics: bool,
    /// Keep the pose constant (reference frame); only meaningful with free intrinsics.
    pub fix_pose: bool,
    /// Robust loss on reprojection residuals. Priors are never robustified.
    pub robust_loss: RobustLoss,
    /// Orientation prior on the pose; `None` disables it.
    pub up_vector: Option<UpVectorPrior>,
    /// Priors used only when intrinsics are optimized.
    pub intrinsics_priors: IntrinsicsPriors,
    /// Maximum LM iterations.
    pub max_iters: usize,
    /// Solver worker threads.
    pub num_threads: usize,
    pub linear_solver: LinearSolverKind,
    pub verbosity: usize,
}

impl Default for PoseRefineOptions {
    fn default() -> Self {
        Self {
            optimize_intrinsics: false,
            fix_pose: false,
            robust_loss: RobustLoss::Huber { scale: 1.0 },
            up_vector: Some(UpVectorPrior::default()),
            intrinsics_priors: IntrinsicsPriors::default(),
            max_iters: MAX_REFINE_ITERATIONS,
            num_threads: 1,
            linear_solver: LinearSolverKind::SparseCholesky,
            verbosity: 0,
        }
    }
}

impl PoseRefineOptions {
    fn backend_options(&self) -> BackendSolveOptions {
        BackendSolveOptions {
            max_iters: self.max_iters,
            verbosity: self.verbosity,
            linear_solver: Some(self.linear_solver),
            min_abs_decrease: Some(1e-12),
            min_rel_decrease: Some(1e-10),
            min_error: Some(1e-14),
            num_threads: Some(self.num_threads),
        }
    }
}

/// Per-observation reprojection summary for a pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReprojectionStats {
    /// Pixel error per observation; `None` when the point is behind the camera.
    pub per_point: Vec<Option<Real>>,
    pub rmse: Real,
    pub median: Real,
    pub max: Real,
    pub n_behind: usize,
}

/// Compute reprojection errors (pixels) of `points` through `camera` at `pose`.
pub fn reprojection_stats(
    camera: &Camera,
    pose: &WorldToCamera,
    points: &[Pt3],
    observations: &[Observation],
) -> ReprojectionStats {
    let per_point: Vec<Option<Real>> = points
        .iter()
        .zip(observations)
        .map(|(p, o)| camera.project_world(pose, p).map(|uv| (uv - o.uv).norm()))
        .collect();
    let errors: Vec<Real> = per_point.iter().flatten().copied().collect();
    let n_behind = per_point.len() - errors.len();
    let rmse = if errors.is_empty() {
        0.0
    } else {
        (errors.iter().map(|e| e * e).sum::<Real>() / errors.len() as Real).sqrt()
    };
    ReprojectionStats {
        median: median(&errors).unwrap_or(0.0),
        max: errors.iter().copied().fold(0.0, Real::max),
        rmse,
        n_behind,
        per_point,
    }
}

/// Wall-clock laps of one refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RefineTiming {
    /// Problem construction.
    pub setup: Duration,
    /// Solver run, including result extraction.
    pub solve: Duration,
}

/// Result of [`refine_pose`].
#[derive(Debug, Clone)]
pub struct PoseRefinement {
    pub pose: WorldToCamera,
    /// Identical to the input camera unless intrinsics were optimized.
    pub camera: Camera,
    pub final_cost: f64,
    pub reprojection: ReprojectionStats,
    pub timing: RefineTiming,
}

fn check_inputs(
    points: &[Pt3],
    observations: &[Observation],
    init_pose: &WorldToCamera,
    camera: &Camera,
    opts: &PoseRefineOptions,
) -> Result<(), RefineError> {
    if points.len() != observations.len() {
        return Err(RefineError::ShapeMismatch {
            points: points.len(),
            observations: observations.len(),
        });
    }
    if points.is_empty() {
        return Err(RefineError::NoCorrespondences);
    }
    let invalid = |msg: String| Err(RefineError::InvalidInput(msg));
    if let Some(idx) = observations.iter().position(|o| !o.is_valid()) {
        return invalid(format!("observation {idx} is invalid: {:?}", observations[idx]));
    }
    if let Some(idx) = points
        .iter()
        .position(|p| !p.coords.iter().all(|v| v.is_finite()))
    {
        return invalid(format!("point {idx} is not finite"));
    }
    if !init_pose.is_finite() {
        return invalid("initial pose is not finite".to_string());
    }
    if let Err(e) = camera.validate() {
        return invalid(e.to_string());
    }
    if opts.fix_pose && !opts.optimize_intrinsics {
        return invalid("pose and camera are both fixed".to_string());
    }
    if opts.max_iters == 0 || opts.num_threads == 0 {
        return invalid("max_iters and num_threads must be positive".to_string());
    }
    Ok(())
}

/// Build the refinement IR and its initial values.
///
/// Blocks: `cam/<id>` (4), `dist/<id>` (5), [`POSE_BLOCK`] (SE3), and
/// `point/<i>` (3, always fixed) for every observation.
pub fn build_pose_refine_ir(
    points: &[Pt3],
    observations: &[Observation],
    init_pose: &WorldToCamera,
    camera: &Camera,
    opts: &PoseRefineOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
    ensure!(
        points.len() == observations.len(),
        "3D / 2D counts must match: {} vs {}",
        points.len(),
        observations.len()
    );

    let mut ir = ProblemIR::new();
    let mut initial_map = HashMap::new();

    // 1. Camera
    let camera_mask = |dim| {
        if opts.optimize_intrinsics {
            FixedMask::all_free()
        } else {
            FixedMask::all_fixed(dim)
        }
    };
    let cam_key = format!("cam/{}", camera.id);
    let cam_id = ir.add_param_block(&cam_key, 4, ManifoldKind::Euclidean, camera_mask(4));
    initial_map.insert(cam_key, intrinsics_to_dvec(&camera.intrinsics));

    let dist_key = format!("dist/{}", camera.id);
    let dist_id = ir.add_param_block(&dist_key, 5, ManifoldKind::Euclidean, camera_mask(5));
    initial_map.insert(dist_key, distortion_to_dvec(&camera.distortion));

    // 2. Pose
    let pose_mask = if opts.fix_pose {
        FixedMask::all_fixed(7)
    } else {
        FixedMask::all_free()
    };
    let pose_id = ir.add_param_block(POSE_BLOCK, 7, ManifoldKind::SE3, pose_mask);
    initial_map.insert(POSE_BLOCK.to_string(), pose_to_se3_dvec(init_pose));

    // 3. Fixed points, one reprojection each
    for (idx, (pw, obs)) in points.iter().zip(observations).enumerate() {
        let key = format!("point/{idx}");
        let point_id = ir.add_param_block(&key, 3, ManifoldKind::Euclidean, FixedMask::all_fixed(3));
        initial_map.insert(key, DVector::from_row_slice(pw.coords.as_slice()));

        ir.add_residual(
            vec![cam_id, dist_id, pose_id, point_id],
            FactorKind::ReprojLandmarkPinhole4Dist5 {
                uv: [obs.uv.x, obs.uv.y],
                w: 1.0 / (obs.scale * obs.scale),
            },
            opts.robust_loss,
        );
    }

    // 4. Orientation prior
    if let Some(up) = &opts.up_vector {
        let world_up = Vec3::from(up.world_up).normalize();
        let camera_up = Vec3::from(up.camera_up).normalize();
        ir.add_residual(
            vec![pose_id],
            FactorKind::UpVectorPrior {
                world_up: world_up.into(),
                camera_up: camera_up.into(),
                sigma: up.sigma,
            },
            RobustLoss::None,
        );
    }

    // 5. Intrinsics priors, centered on the input camera
    if opts.optimize_intrinsics {
        let k = &camera.intrinsics;
        let priors = &opts.intrinsics_priors;
        ir.add_residual(
            vec![cam_id],
            FactorKind::FocalLogPrior {
                focal: [k.fx, k.fy],
                sigma: priors.focal_sd,
            },
            RobustLoss::None,
        );
        ir.add_residual(
            vec![cam_id],
            FactorKind::PrincipalPointPrior {
                center: [k.cx, k.cy],
                sigma: priors.principal_point_sd * camera.max_dimension(),
            },
            RobustLoss::None,
        );
        ir.add_residual(
            vec![dist_id],
            FactorKind::DistortionPrior {
                mean: camera.distortion.to_array(),
                sigma: priors.distortion_sd(),
            },
            RobustLoss::None,
        );
    }

    ir.validate()?;
    Ok((ir, initial_map))
}

/// Refine a world-to-camera pose from index-aligned landmarks and observations.
///
/// Landmarks are never moved. The camera is returned untouched unless
/// `opts.optimize_intrinsics` is set. No acceptance test is applied to the
/// final residuals; callers judge the fit from [`PoseRefinement::reprojection`].
pub fn refine_pose(
    points: &[Pt3],
    observations: &[Observation],
    init_pose: &WorldToCamera,
    camera: &Camera,
    opts: &PoseRefineOptions,
) -> Result<PoseRefinement, RefineError> {
    check_inputs(points, observations, init_pose, camera, opts)?;

    let t_setup = Instant::now();
    let (ir, initial_map) = build_pose_refine_ir(points, observations, init_pose, camera, opts)
        .map_err(|e| RefineError::InvalidInput(format!("{e:#}")))?;
    let setup = t_setup.elapsed();

    let t_solve = Instant::now();
    let (pose, refined_camera, final_cost) =
        solve_and_extract(&ir, &initial_map, camera, opts)
            .map_err(|e| RefineError::Solver(format!("{e:#}")))?;
    let solve = t_solve.elapsed();

    let reprojection = reprojection_stats(&refined_camera, &pose, points, observations);
    log::debug!(
        "pose refinement: {} points, cost {:.3e}, rmse {:.3} px, setup {:?}, solve {:?}",
        points.len(),
        final_cost,
        reprojection.rmse,
        setup,
        solve
    );

    Ok(PoseRefinement {
        pose,
        camera: refined_camera,
        final_cost,
        reprojection,
        timing: RefineTiming { setup, solve },
    })
}

/// [`refine_pose`] over explicit landmark/observation pairs.
pub fn refine_correspondences(
    correspondences: &[Correspondence],
    init_pose: &WorldToCamera,
    camera: &Camera,
    opts: &PoseRefineOptions,
) -> Result<PoseRefinement, RefineError> {
    let (points, observations) = split_correspondences(correspondences);
    refine_pose(&points, &observations, init_pose, camera, opts)
}

fn solve_and_extract(
    ir: &ProblemIR,
    initial_map: &HashMap<String, DVector<f64>>,
    camera: &Camera,
    opts: &PoseRefineOptions,
) -> Result<(WorldToCamera, Camera, f64)> {
    let solution = solve_with_backend(
        BackendKind::TinySolver,
        ir,
        initial_map,
        &opts.backend_options(),
    )?;
    let block = |name: &str| {
        solution
            .params
            .get(name)
            .ok_or_else(|| anyhow!("solution missing block {name}"))
    };

    let pose = se3_dvec_to_pose(block(POSE_BLOCK)?.as_view())?;
    let refined_camera = if opts.optimize_intrinsics {
        let cam = camera_from_blocks(
            camera,
            block(&format!("cam/{}", camera.id))?.as_view(),
            block(&format!("dist/{}", camera.id))?.as_view(),
        )?;
        cam.validate()?;
        cam
    } else {
        camera.clone()
    };
    Ok((pose, refined_camera, solution.final_cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vslam_core::synthetic::scene;
    use vslam_core::{PinholeIntrinsics, Vec2};

    fn camera() -> Camera {
        Camera::new("cam0", 640, 480, PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0))
    }

    #[test]
    fn shape_mismatch_is_reported_before_solving() {
        let points = vec![Pt3::new(0.0, 0.0, 5.0); 3];
        let obs = vec![Observation::new(Vec2::new(320.0, 240.0), 1.0); 2];
        let err = refine_pose(
            &points,
            &obs,
            &WorldToCamera::identity(),
            &camera(),
            &PoseRefineOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RefineError::ShapeMismatch {
                points: 3,
                observations: 2
            }
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = refine_pose(
            &[],
            &[],
            &WorldToCamera::identity(),
            &camera(),
            &PoseRefineOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, RefineError::NoCorrespondences);
    }

    #[test]
    fn zero_scale_observation_is_invalid() {
        let points = vec![Pt3::new(0.0, 0.0, 5.0)];
        let obs = vec![Observation::new(Vec2::new(320.0, 240.0), 0.0)];
        let err = refine_pose(
            &points,
            &obs,
            &WorldToCamera::identity(),
            &camera(),
            &PoseRefineOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RefineError::InvalidInput(_)), "{err}");
    }

    #[test]
    fn fully_fixed_problem_is_invalid() {
        let points = vec![Pt3::new(0.0, 0.0, 5.0)];
        let obs = vec![Observation::new(Vec2::new(320.0, 240.0), 1.0)];
        let opts = PoseRefineOptions {
            fix_pose: true,
            ..PoseRefineOptions::default()
        };
        let err = refine_pose(&points, &obs, &WorldToCamera::identity(), &camera(), &opts)
            .unwrap_err();
        assert!(matches!(err, RefineError::InvalidInput(_)));
    }

    #[test]
    fn ir_layout_with_fixed_camera() {
        let cam = camera();
        let lms = scene::landmark_cloud(40, 5);
        let corrs = scene::observe(&cam, &WorldToCamera::identity(), &lms, None, 0);
        let (points, obs) = split_correspondences(&corrs);
        let (ir, init) = build_pose_refine_ir(
            &points,
            &obs,
            &WorldToCamera::identity(),
            &cam,
            &PoseRefineOptions::default(),
        )
        .unwrap();

        assert_eq!(ir.params.len(), 3 + points.len());
        assert_eq!(init.len(), ir.params.len());
        // reprojections + up-vector prior, no intrinsics priors
        assert_eq!(ir.residuals.len(), points.len() + 1);
        let free: Vec<&str> = ir.free_params().map(|p| p.name.as_str()).collect();
        assert_eq!(free, vec![POSE_BLOCK]);
    }

    #[test]
    fn ir_layout_with_free_camera_adds_priors() {
        let cam = camera();
        let lms = scene::landmark_cloud(40, 5);
        let corrs = scene::observe(&cam, &WorldToCamera::identity(), &lms, None, 0);
        let (points, obs) = split_correspondences(&corrs);
        let opts = PoseRefineOptions {
            optimize_intrinsics: true,
            up_vector: None,
            ..PoseRefineOptions::default()
        };
        let (ir, _) =
            build_pose_refine_ir(&points, &obs, &WorldToCamera::identity(), &cam, &opts).unwrap();
        assert_eq!(ir.residuals.len(), points.len() + 3);
        assert_eq!(ir.free_params().count(), 3);
    }

    #[test]
    fn reprojection_stats_counts_points_behind() {
        let cam = camera();
        let points = vec![Pt3::new(0.0, 0.0, 5.0), Pt3::new(0.0, 0.0, -5.0)];
        let obs = vec![
            Observation::new(Vec2::new(323.0, 244.0), 1.0),
            Observation::new(Vec2::new(0.0, 0.0), 1.0),
        ];
        let stats = reprojection_stats(&cam, &WorldToCamera::identity(), &points, &obs);
        assert_eq!(stats.n_behind, 1);
        assert!((stats.rmse - 5.0).abs() < 1e-12);
        assert_eq!(stats.per_point[1], None);
    }
}
