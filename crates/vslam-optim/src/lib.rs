//! Non-linear pose refinement built on tiny-solver.
//!
//! Problems are described in a backend-independent IR ([`ir`]) and compiled
//! by a backend ([`backend`]). Residual models live in [`factors`], parameter
//! packing in [`params`], and problem builders in [`problems`].

pub mod backend;
pub mod factors;
pub mod ir;
pub mod params;
pub mod problems;

pub use crate::backend::{
    solve_with_backend, BackendKind, BackendSolution, BackendSolveOptions, LinearSolverKind,
    OptimBackend, TinySolverBackend,
};
pub use crate::ir::RobustLoss;
pub use crate::problems::pose_refine::{
    build_pose_refine_ir, refine_correspondences, refine_pose, reprojection_stats,
    IntrinsicsPriors, PoseRefineOptions, PoseRefinement, RefineError, RefineTiming,
    ReprojectionStats, UpVectorPrior, MAX_REFINE_ITERATIONS,
};
