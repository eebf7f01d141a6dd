//! Tracking configuration.
//!
//! Keys follow the reconstruction config naming (`loss_function`,
//! `exif_focal_sd`, `radial_distorsion_k1_sd`, ...). Every key is optional in
//! JSON and falls back to [`TrackingConfig::default`]; unknown keys are
//! rejected.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vslam_optim::{
    IntrinsicsPriors, LinearSolverKind, PoseRefineOptions, RobustLoss, UpVectorPrior,
    MAX_REFINE_ITERATIONS,
};

/// Robust loss shape for reprojection residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossFunction {
    TrivialLoss,
    HuberLoss,
    CauchyLoss,
    ArctanLoss,
}

/// Initial pose used when tracking against the last keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyframeInitPose {
    /// Start from the identity pose.
    #[default]
    Identity,
    /// Start from the keyframe's own pose.
    Keyframe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    /// Optimize intrinsics and distortion during refinement.
    pub optimize_camera_parameters: bool,
    pub loss_function: LossFunction,
    /// Loss scale in units of feature scale.
    pub loss_function_threshold: f64,
    /// Log-ratio SD of the focal prior.
    pub exif_focal_sd: f64,
    /// Principal point SD relative to the largest image dimension.
    pub principal_point_sd: f64,
    pub radial_distorsion_k1_sd: f64,
    pub radial_distorsion_k2_sd: f64,
    pub radial_distorsion_k3_sd: f64,
    pub radial_distorsion_p1_sd: f64,
    pub radial_distorsion_p2_sd: f64,
    /// Solver worker threads.
    pub processes: usize,
    /// SD of the up-vector prior; `0` disables the prior.
    pub up_vector_sd: f64,
    /// World up direction, world frame.
    pub up_vector_world: [f64; 3],
    /// Up direction in the camera frame.
    pub up_vector_camera: [f64; 3],
    pub keyframe_init_pose: KeyframeInitPose,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let up = UpVectorPrior::default();
        let priors = IntrinsicsPriors::default();
        Self {
            optimize_camera_parameters: false,
            loss_function: LossFunction::HuberLoss,
            loss_function_threshold: 1.0,
            exif_focal_sd: priors.focal_sd,
            principal_point_sd: priors.principal_point_sd,
            radial_distorsion_k1_sd: priors.k1_sd,
            radial_distorsion_k2_sd: priors.k2_sd,
            radial_distorsion_k3_sd: priors.k3_sd,
            radial_distorsion_p1_sd: priors.p1_sd,
            radial_distorsion_p2_sd: priors.p2_sd,
            processes: 1,
            up_vector_sd: up.sigma,
            up_vector_world: up.world_up,
            up_vector_camera: up.camera_up,
            keyframe_init_pose: KeyframeInitPose::Identity,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and positive, got {v}")))
    }
}

fn check_direction(field: &'static str, v: &[f64; 3]) -> Result<(), ConfigError> {
    let norm = v.iter().map(|c| c * c).sum::<f64>().sqrt();
    if v.iter().all(|c| c.is_finite()) && norm > 1e-9 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a non-zero direction, got {v:?}")))
    }
}

impl TrackingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loss_function != LossFunction::TrivialLoss {
            check_positive("loss_function_threshold", self.loss_function_threshold)?;
        }
        check_positive("exif_focal_sd", self.exif_focal_sd)?;
        check_positive("principal_point_sd", self.principal_point_sd)?;
        check_positive("radial_distorsion_k1_sd", self.radial_distorsion_k1_sd)?;
        check_positive("radial_distorsion_k2_sd", self.radial_distorsion_k2_sd)?;
        check_positive("radial_distorsion_k3_sd", self.radial_distorsion_k3_sd)?;
        check_positive("radial_distorsion_p1_sd", self.radial_distorsion_p1_sd)?;
        check_positive("radial_distorsion_p2_sd", self.radial_distorsion_p2_sd)?;
        if self.processes == 0 {
            return Err(invalid("processes", "must be at least 1"));
        }
        if self.up_vector_sd != 0.0 {
            check_positive("up_vector_sd", self.up_vector_sd)?;
            check_direction("up_vector_world", &self.up_vector_world)?;
            check_direction("up_vector_camera", &self.up_vector_camera)?;
        }
        Ok(())
    }

    pub fn robust_loss(&self) -> RobustLoss {
        let scale = self.loss_function_threshold;
        match self.loss_function {
            LossFunction::TrivialLoss => RobustLoss::None,
            LossFunction::HuberLoss => RobustLoss::Huber { scale },
            LossFunction::CauchyLoss => RobustLoss::Cauchy { scale },
            LossFunction::ArctanLoss => RobustLoss::Arctan { scale },
        }
    }

    /// Refinement options for a free pose.
    pub fn refine_options(&self) -> PoseRefineOptions {
        let up_vector = (self.up_vector_sd != 0.0).then(|| UpVectorPrior {
            world_up: self.up_vector_world,
            camera_up: self.up_vector_camera,
            sigma: self.up_vector_sd,
        });
        PoseRefineOptions {
            optimize_intrinsics: self.optimize_camera_parameters,
            fix_pose: false,
            robust_loss: self.robust_loss(),
            up_vector,
            intrinsics_priors: IntrinsicsPriors {
                focal_sd: self.exif_focal_sd,
                principal_point_sd: self.principal_point_sd,
                k1_sd: self.radial_distorsion_k1_sd,
                k2_sd: self.radial_distorsion_k2_sd,
                k3_sd: self.radial_distorsion_k3_sd,
                p1_sd: self.radial_distorsion_p1_sd,
                p2_sd: self.radial_distorsion_p2_sd,
            },
            max_iters: MAX_REFINE_ITERATIONS,
            num_threads: self.processes,
            linear_solver: LinearSolverKind::SparseCholesky,
            verbosity: 0,
        }
    }
}
