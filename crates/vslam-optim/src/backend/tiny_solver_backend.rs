use crate::backend::{BackendSolution, BackendSolveOptions, LinearSolverKind, OptimBackend};
use crate::factors::priors::{
    distortion_prior_generic, focal_log_prior_generic, principal_point_prior_generic,
    up_vector_residual_generic,
};
use crate::factors::reprojection::reproj_residual_landmark_generic;
use crate::ir::{FactorKind, ManifoldKind, ProblemIR, ResidualBlock, RobustLoss};
use anyhow::{anyhow, ensure, Result};
use nalgebra::{DVector, RealField};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{ArctanLoss, CauchyLoss, HuberLoss, Loss};
use tiny_solver::manifold::se3::SE3Manifold;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// tiny-solver backend adapter.
///
/// Fully fixed blocks are not registered as solver variables: their values
/// are folded into the factors that use them and copied to the solution
/// unchanged.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

struct Compiled {
    problem: Problem,
    /// Initial values of the registered variables only.
    variables: HashMap<String, DVector<f64>>,
    /// Blocks passed through untouched (constants and unreferenced blocks).
    passthrough: HashMap<String, DVector<f64>>,
}

impl TinySolverBackend {
    fn compile(&self, ir: &ProblemIR, initial: &HashMap<String, DVector<f64>>) -> Result<Compiled> {
        ir.validate()?;

        let mut values = Vec::with_capacity(ir.params.len());
        for param in &ir.params {
            let init = initial.get(&param.name).ok_or_else(|| {
                anyhow!(
                    "initial values missing parameter {} (id {:?})",
                    param.name,
                    param.id
                )
            })?;
            ensure!(
                init.len() == param.dim,
                "initial dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                init.len()
            );
            values.push(init);
        }

        let referenced: HashSet<usize> = ir
            .residuals
            .iter()
            .flat_map(|r| r.params.iter().map(|p| p.0))
            .collect();

        let mut problem = Problem::new();
        let mut variables = HashMap::new();
        let mut passthrough = HashMap::new();

        for param in &ir.params {
            let value = values[param.id.0].clone();
            if param.is_constant() || !referenced.contains(&param.id.0) {
                if !param.is_constant() {
                    log::warn!("param {} is free but unused by any residual", param.name);
                }
                passthrough.insert(param.name.clone(), value);
                continue;
            }

            match param.manifold {
                ManifoldKind::Euclidean => {
                    for idx in param.fixed.iter() {
                        problem.fix_variable(&param.name, idx);
                    }
                }
                ManifoldKind::SE3 => {
                    problem.set_variable_manifold(&param.name, Arc::new(SE3Manifold));
                }
            }
            variables.insert(param.name.clone(), value);
        }
        ensure!(!variables.is_empty(), "problem has no free parameters");

        for residual in &ir.residuals {
            let constants: Vec<Option<DVector<f64>>> = residual
                .params
                .iter()
                .map(|id| {
                    let p = &ir.params[id.0];
                    p.is_constant().then(|| values[id.0].clone())
                })
                .collect();
            let free_names: Vec<&str> = residual
                .params
                .iter()
                .filter(|id| !ir.params[id.0].is_constant())
                .map(|id| ir.params[id.0].name.as_str())
                .collect();
            if free_names.is_empty() {
                // Constant residual: no effect on the minimizer.
                continue;
            }
            let (factor, loss) = compile_factor(residual, constants)?;
            problem.add_residual_block(residual.residual_dim, &free_names, factor, loss);
        }

        Ok(Compiled {
            problem,
            variables,
            passthrough,
        })
    }
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let Compiled {
            problem,
            variables,
            passthrough,
        } = self.compile(ir, initial)?;
        log::debug!(
            "tiny-solver: {} variables, {} constant blocks, {} residuals",
            variables.len(),
            passthrough.len(),
            ir.residuals.len()
        );

        let optimizer = LevenbergMarquardtOptimizer::default();
        let options = to_optimizer_options(opts);
        let solution = optimizer
            .optimize(&problem, &variables, Some(options))
            .ok_or_else(|| anyhow!("tiny-solver failed to converge"))?;

        let param_blocks = problem.initialize_parameter_blocks(&solution);
        let residuals = problem.compute_residuals(&param_blocks, true);
        let final_cost = 0.5 * residuals.as_ref().squared_norm_l2();
        ensure!(final_cost.is_finite(), "tiny-solver produced a non-finite cost");

        let mut params = solution;
        for (name, value) in &params {
            ensure!(
                value.iter().all(|v| v.is_finite()),
                "tiny-solver produced non-finite values for {}",
                name
            );
        }
        params.extend(passthrough);

        Ok(BackendSolution { params, final_cost })
    }
}

fn to_optimizer_options(opts: &BackendSolveOptions) -> OptimizerOptions {
    let mut options = OptimizerOptions {
        max_iteration: opts.max_iters,
        verbosity_level: opts.verbosity,
        ..OptimizerOptions::default()
    };
    if let Some(solver) = opts.linear_solver {
        options.linear_solver_type = match solver {
            LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
            LinearSolverKind::SparseQR => LinearSolverType::SparseQR,
        };
    }
    if let Some(v) = opts.min_abs_decrease {
        options.min_abs_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_rel_decrease {
        options.min_rel_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_error {
        options.min_error_threshold = v;
    }
    options
}

fn compile_loss(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    match loss {
        RobustLoss::None => Ok(None),
        RobustLoss::Huber { scale } => {
            ensure!(scale > 0.0, "Huber scale must be positive");
            Ok(Some(Box::new(HuberLoss::new(scale))))
        }
        RobustLoss::Cauchy { scale } => {
            ensure!(scale > 0.0, "Cauchy scale must be positive");
            Ok(Some(Box::new(CauchyLoss::new(scale))))
        }
        RobustLoss::Arctan { scale } => {
            ensure!(scale > 0.0, "Arctan scale must be positive");
            Ok(Some(Box::new(ArctanLoss::new(scale))))
        }
    }
}

type CompiledFactor = (
    Box<dyn tiny_solver::factors::FactorImpl + Send>,
    Option<Box<dyn Loss + Send>>,
);

fn compile_factor(
    residual: &ResidualBlock,
    constants: Vec<Option<DVector<f64>>>,
) -> Result<CompiledFactor> {
    let loss = compile_loss(residual.loss)?;
    let factor = TinyFactor {
        kind: residual.factor.clone(),
        constants,
    };
    Ok((Box::new(factor), loss))
}

/// One IR residual with its constant blocks folded in.
///
/// `constants` has one slot per IR parameter; `None` slots are filled, in
/// order, from the variables tiny-solver passes in.
#[derive(Debug, Clone)]
struct TinyFactor {
    kind: FactorKind,
    constants: Vec<Option<DVector<f64>>>,
}

impl<T: RealField> Factor<T> for TinyFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let mut free = params.iter().cloned();
        let full: Vec<DVector<T>> = self
            .constants
            .iter()
            .filter_map(|slot| match slot {
                Some(c) => Some(c.map(|v| nalgebra::convert::<f64, T>(v))),
                None => free.next(),
            })
            .collect();
        debug_assert_eq!(full.len(), self.constants.len(), "parameter count mismatch");
        evaluate_factor(&self.kind, &full)
    }
}

fn evaluate_factor<T: RealField>(kind: &FactorKind, p: &[DVector<T>]) -> DVector<T> {
    match kind {
        FactorKind::ReprojLandmarkPinhole4Dist5 { uv, w } => {
            let r = reproj_residual_landmark_generic(
                p[0].as_view(), // intrinsics
                p[1].as_view(), // distortion
                p[2].as_view(), // pose
                p[3].as_view(), // point
                *uv,
                *w,
            );
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::UpVectorPrior {
            world_up,
            camera_up,
            sigma,
        } => {
            let r = up_vector_residual_generic(p[0].as_view(), *world_up, *camera_up, *sigma);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::FocalLogPrior { focal, sigma } => {
            let r = focal_log_prior_generic(p[0].as_view(), *focal, *sigma);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::PrincipalPointPrior { center, sigma } => {
            let r = principal_point_prior_generic(p[0].as_view(), *center, *sigma);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::DistortionPrior { mean, sigma } => {
            let r = distortion_prior_generic(p[0].as_view(), *mean, *sigma);
            DVector::from_row_slice(r.as_slice())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FixedMask;
    use nalgebra::dvector;

    #[test]
    fn constants_are_folded_and_returned_unchanged() {
        let mut ir = ProblemIR::new();
        let cam = ir.add_param_block("cam", 4, ManifoldKind::Euclidean, FixedMask::all_free());
        let dist = ir.add_param_block("dist", 5, ManifoldKind::Euclidean, FixedMask::all_fixed(5));
        ir.add_residual(
            vec![cam],
            FactorKind::FocalLogPrior {
                focal: [400.0, 400.0],
                sigma: 0.1,
            },
            RobustLoss::None,
        );
        ir.add_residual(
            vec![cam],
            FactorKind::PrincipalPointPrior {
                center: [320.0, 240.0],
                sigma: 1.0,
            },
            RobustLoss::None,
        );
        ir.add_residual(
            vec![dist],
            FactorKind::DistortionPrior {
                mean: [0.0; 5],
                sigma: [1.0; 5],
            },
            RobustLoss::None,
        );

        let mut initial = HashMap::new();
        initial.insert("cam".to_string(), dvector![420.0, 380.0, 300.0, 250.0]);
        let dist0 = dvector![0.1, 0.0, 0.0, 0.0, 0.0];
        initial.insert("dist".to_string(), dist0.clone());

        let compiled = TinySolverBackend.compile(&ir, &initial).unwrap();
        assert_eq!(compiled.variables.len(), 1);
        assert!(compiled.passthrough.contains_key("dist"));

        let opts = BackendSolveOptions {
            min_abs_decrease: Some(1e-14),
            min_rel_decrease: Some(1e-14),
            min_error: Some(1e-16),
            ..BackendSolveOptions::default()
        };
        let sol = TinySolverBackend.solve(&ir, &initial, &opts).unwrap();
        assert_eq!(sol.params["dist"], dist0);
        let cam = &sol.params["cam"];
        assert!((cam[0] - 400.0).abs() < 1e-2, "cam={cam}");
        assert!((cam[3] - 240.0).abs() < 1e-2, "cam={cam}");
    }

    #[test]
    fn all_constant_problem_is_rejected() {
        let mut ir = ProblemIR::new();
        let dist = ir.add_param_block("dist", 5, ManifoldKind::Euclidean, FixedMask::all_fixed(5));
        ir.add_residual(
            vec![dist],
            FactorKind::DistortionPrior {
                mean: [0.0; 5],
                sigma: [1.0; 5],
            },
            RobustLoss::None,
        );
        let mut initial = HashMap::new();
        initial.insert("dist".to_string(), DVector::zeros(5));
        let err = TinySolverBackend
            .solve(&ir, &initial, &BackendSolveOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("no free parameters"));
    }

    #[test]
    fn missing_initial_value_is_reported() {
        let mut ir = ProblemIR::new();
        ir.add_param_block("cam", 4, ManifoldKind::Euclidean, FixedMask::all_free());
        let err = TinySolverBackend
            .solve(&ir, &HashMap::new(), &BackendSolveOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("missing parameter cam"));
    }

    #[test]
    fn folded_factor_interleaves_constants() {
        let factor = TinyFactor {
            kind: FactorKind::PrincipalPointPrior {
                center: [1.0, 2.0],
                sigma: 1.0,
            },
            constants: vec![None],
        };
        let r = Factor::<f64>::residual_func(&factor, &[dvector![0.0, 0.0, 3.0, 5.0]]);
        assert_eq!(r, dvector![2.0, 3.0]);
    }
}
