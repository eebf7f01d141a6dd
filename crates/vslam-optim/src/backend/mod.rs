//! Backend adapters that compile the IR into solver-specific problems.
//!
//! Backends translate the IR into solver-native graphs, apply manifolds and
//! constraints, and return a solved parameter map keyed by block name.

mod tiny_solver_backend;

use anyhow::{anyhow, Result};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ir::ProblemIR;

pub use tiny_solver_backend::TinySolverBackend;

/// Backend-agnostic solver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSolveOptions {
    /// Maximum number of iterations for the optimizer.
    pub max_iters: usize,
    /// Verbosity level (backend-specific).
    pub verbosity: usize,
    /// Optional linear solver selection.
    pub linear_solver: Option<LinearSolverKind>,
    /// Absolute error decrease threshold for early termination.
    pub min_abs_decrease: Option<f64>,
    /// Relative error decrease threshold for early termination.
    pub min_rel_decrease: Option<f64>,
    /// Error threshold for early termination.
    pub min_error: Option<f64>,
    /// Worker threads for residual and Jacobian evaluation; `None` uses the
    /// caller's rayon pool.
    pub num_threads: Option<usize>,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            verbosity: 0,
            linear_solver: Some(LinearSolverKind::SparseCholesky),
            min_abs_decrease: Some(1e-5),
            min_rel_decrease: Some(1e-5),
            min_error: Some(1e-10),
            num_threads: None,
        }
    }
}

/// Linear solver selection (backend-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Sparse Cholesky decomposition of the normal equations.
    SparseCholesky,
    /// Sparse QR decomposition.
    SparseQR,
}

/// Solver output from a backend.
///
/// `params` holds every IR block by name, constants included.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    /// Optimized parameter vectors keyed by block name.
    pub params: HashMap<String, DVector<f64>>,
    /// Final robustified cost.
    pub final_cost: f64,
}

/// Backend interface implemented by solver adapters.
pub trait OptimBackend {
    /// Solve a compiled IR with the provided initial parameters.
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution>;
}

/// Supported solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// tiny-solver Levenberg-Marquardt backend.
    #[default]
    TinySolver,
}

/// Solve a problem using the selected backend, on a dedicated thread pool
/// when `opts.num_threads` is set.
///
/// Callers already running inside a rayon pool of the requested size are
/// solved in place; a new pool is only built otherwise.
pub fn solve_with_backend(
    backend: BackendKind,
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &BackendSolveOptions,
) -> Result<BackendSolution> {
    let run = || match backend {
        BackendKind::TinySolver => TinySolverBackend.solve(ir, initial, opts),
    };
    match opts.num_threads {
        Some(0) => Err(anyhow!("num_threads must be at least 1")),
        Some(n) if needs_own_pool(n) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            log::debug!("solving on a new {n}-thread pool");
            pool.install(run)
        }
        _ => run(),
    }
}

/// `true` unless the current thread is a worker of a pool with `n` threads.
fn needs_own_pool(n: usize) -> bool {
    rayon::current_thread_index().is_none() || rayon::current_num_threads() != n
}
