use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier for a parameter block in the IR.
///
/// Stable within a `ProblemIR` instance; residual blocks use it to reference
/// their parameter dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// Supported manifold types for parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldKind {
    /// Standard Euclidean vector space.
    Euclidean,
    /// SE(3) pose stored as `[qx, qy, qz, qw, tx, ty, tz]`.
    SE3,
}

impl ManifoldKind {
    /// Returns `true` if the given ambient dimension matches the manifold storage.
    pub fn compatible_dim(self, dim: usize) -> bool {
        match self {
            ManifoldKind::Euclidean => dim > 0,
            ManifoldKind::SE3 => dim == 7,
        }
    }
}

/// Fixed parameter mask for a block.
///
/// Fully fixed blocks are treated as constants by the backend. Partial masks
/// are only meaningful for Euclidean blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedMask {
    fixed_indices: BTreeSet<usize>,
}

impl FixedMask {
    /// Creates a mask with no fixed indices.
    pub fn all_free() -> Self {
        Self::default()
    }

    /// Creates a mask with all indices fixed.
    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed_indices: (0..dim).collect(),
        }
    }

    /// Creates a mask from an explicit list of indices.
    pub fn fix_indices(indices: &[usize]) -> Self {
        Self {
            fixed_indices: indices.iter().copied().collect(),
        }
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed_indices.contains(&idx)
    }

    /// Returns `true` if all indices `[0, dim)` are fixed.
    pub fn is_all_fixed(&self, dim: usize) -> bool {
        (0..dim).all(|i| self.fixed_indices.contains(&i))
    }

    /// Iterates over fixed indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed_indices.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_indices.is_empty()
    }
}

/// Robust loss applied to a residual block.
///
/// Each residual block carries its own loss, so per-observation
/// robustification comes from one residual block per observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
    Arctan {
        scale: f64,
    },
}

/// Backend-agnostic factor kinds.
///
/// Each factor kind implies its parameter layout and residual dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Reprojection of a landmark through pinhole intrinsics, Brown-Conrady
    /// distortion and a world-to-camera SE3 pose.
    ///
    /// Parameters: `[intrinsics, distortion, pose, point]`.
    /// Residual: `(uv - project(point)) * sqrt(w)`.
    ReprojLandmarkPinhole4Dist5 { uv: [f64; 2], w: f64 },
    /// Soft orientation prior on a world-to-camera pose.
    ///
    /// Parameters: `[pose]`.
    /// Residual: `(R * world_up - camera_up) / sigma`.
    UpVectorPrior {
        world_up: [f64; 3],
        camera_up: [f64; 3],
        sigma: f64,
    },
    /// Log-ratio prior on `[fx, fy]`.
    ///
    /// Parameters: `[intrinsics]`.
    FocalLogPrior { focal: [f64; 2], sigma: f64 },
    /// Prior on `[cx, cy]` in pixels.
    ///
    /// Parameters: `[intrinsics]`.
    PrincipalPointPrior { center: [f64; 2], sigma: f64 },
    /// Per-coefficient prior on `[k1, k2, k3, p1, p2]`.
    ///
    /// Parameters: `[distortion]`.
    DistortionPrior { mean: [f64; 5], sigma: [f64; 5] },
}

impl FactorKind {
    /// Residual dimension implied by the factor.
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::ReprojLandmarkPinhole4Dist5 { .. } => 2,
            FactorKind::UpVectorPrior { .. } => 3,
            FactorKind::FocalLogPrior { .. } => 2,
            FactorKind::PrincipalPointPrior { .. } => 2,
            FactorKind::DistortionPrior { .. } => 5,
        }
    }

    /// Expected `(dim, manifold)` for each parameter slot.
    pub fn param_layout(&self) -> &'static [(usize, ManifoldKind)] {
        const INTR: (usize, ManifoldKind) = (4, ManifoldKind::Euclidean);
        const DIST: (usize, ManifoldKind) = (5, ManifoldKind::Euclidean);
        const POSE: (usize, ManifoldKind) = (7, ManifoldKind::SE3);
        const POINT: (usize, ManifoldKind) = (3, ManifoldKind::Euclidean);
        match self {
            FactorKind::ReprojLandmarkPinhole4Dist5 { .. } => &[INTR, DIST, POSE, POINT],
            FactorKind::UpVectorPrior { .. } => &[POSE],
            FactorKind::FocalLogPrior { .. } | FactorKind::PrincipalPointPrior { .. } => &[INTR],
            FactorKind::DistortionPrior { .. } => &[DIST],
        }
    }

    fn check_data(&self) -> Result<()> {
        match self {
            FactorKind::ReprojLandmarkPinhole4Dist5 { uv, w } => {
                ensure!(
                    uv.iter().all(|v| v.is_finite()),
                    "reprojection factor has non-finite observation {:?}",
                    uv
                );
                ensure!(
                    w.is_finite() && *w > 0.0,
                    "reprojection factor weight must be positive, got {}",
                    w
                );
            }
            FactorKind::UpVectorPrior {
                world_up,
                camera_up,
                sigma,
            } => {
                let norm = |v: &[f64; 3]| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                ensure!(
                    (norm(world_up) - 1.0).abs() < 1e-6 && (norm(camera_up) - 1.0).abs() < 1e-6,
                    "up-vector prior expects unit vectors, got {:?} / {:?}",
                    world_up,
                    camera_up
                );
                ensure!(*sigma > 0.0, "up-vector prior sigma must be positive");
            }
            FactorKind::FocalLogPrior { focal, sigma } => {
                ensure!(
                    focal.iter().all(|f| *f > 0.0),
                    "focal prior expects positive focal lengths, got {:?}",
                    focal
                );
                ensure!(*sigma > 0.0, "focal prior sigma must be positive");
            }
            FactorKind::PrincipalPointPrior { sigma, .. } => {
                ensure!(*sigma > 0.0, "principal point prior sigma must be positive");
            }
            FactorKind::DistortionPrior { sigma, .. } => {
                ensure!(
                    sigma.iter().all(|s| *s > 0.0),
                    "distortion prior sigmas must be positive, got {:?}",
                    sigma
                );
            }
        }
        Ok(())
    }
}

/// Parameter block definition in the IR.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub manifold: ManifoldKind,
    pub fixed: FixedMask,
}

impl ParamBlock {
    pub fn is_constant(&self) -> bool {
        self.fixed.is_all_fixed(self.dim)
    }
}

/// Residual block definition in the IR.
///
/// The order of `params` must match the factor's expected parameter order.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub loss: RobustLoss,
    pub factor: FactorKind,
    pub residual_dim: usize,
}

/// Backend-agnostic optimization problem representation.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter block and returns its `ParamId`.
    pub fn add_param_block(
        &mut self,
        name: impl Into<String>,
        dim: usize,
        manifold: ManifoldKind,
        fixed: FixedMask,
    ) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            dim,
            manifold,
            fixed,
        });
        id
    }

    /// Adds a residual block, deriving its dimension from the factor.
    pub fn add_residual(&mut self, params: Vec<ParamId>, factor: FactorKind, loss: RobustLoss) {
        let residual_dim = factor.residual_dim();
        self.residuals.push(ResidualBlock {
            params,
            loss,
            factor,
            residual_dim,
        });
    }

    /// Blocks the optimizer is allowed to move.
    pub fn free_params(&self) -> impl Iterator<Item = &ParamBlock> + '_ {
        self.params.iter().filter(|p| !p.is_constant())
    }

    /// Validates internal consistency and factor expectations.
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "param id mismatch: expected {}, got {:?}",
                idx,
                param.id
            );
            ensure!(
                names.insert(param.name.as_str()),
                "duplicate param name {}",
                param.name
            );
            ensure!(
                param.manifold.compatible_dim(param.dim),
                "param {} manifold {:?} incompatible with dim {}",
                param.name,
                param.manifold,
                param.dim
            );
            for fixed_idx in param.fixed.iter() {
                ensure!(
                    fixed_idx < param.dim,
                    "param {} fixed index {} out of range",
                    param.name,
                    fixed_idx
                );
            }
            ensure!(
                param.manifold == ManifoldKind::Euclidean
                    || param.fixed.is_empty()
                    || param.is_constant(),
                "param {} on {:?} cannot be partially fixed",
                param.name,
                param.manifold
            );
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            ensure!(
                residual.residual_dim == residual.factor.residual_dim(),
                "residual {} dim {} does not match factor expectation {}",
                r_idx,
                residual.residual_dim,
                residual.factor.residual_dim()
            );
            let layout = residual.factor.param_layout();
            ensure!(
                residual.params.len() == layout.len(),
                "residual {} ({:?}) requires {} params, got {}",
                r_idx,
                residual.factor,
                layout.len(),
                residual.params.len()
            );
            for (slot, (param, (dim, manifold))) in residual.params.iter().zip(layout).enumerate() {
                ensure!(
                    param.0 < self.params.len(),
                    "residual {} references missing param {:?}",
                    r_idx,
                    param
                );
                let block = &self.params[param.0];
                ensure!(
                    block.dim == *dim && block.manifold == *manifold,
                    "residual {} slot {} expects {}D {:?}, got {} with dim={} manifold={:?}",
                    r_idx,
                    slot,
                    dim,
                    manifold,
                    block.name,
                    block.dim,
                    block.manifold
                );
            }
            residual.factor.check_data()?;
        }

        Ok(())
    }
}
