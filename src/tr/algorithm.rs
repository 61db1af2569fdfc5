//! Trust-region driver for nonlinear least squares.
//!
//! [`TrustRegionSolver::iterate`] performs one outer iteration: it keeps
//! computing trial steps, shrinking the region after each rejection, until a
//! step is accepted, then refreshes the Jacobian, the Hessian approximation and
//! the hybrid-model state, and runs the convergence tests.
//! [`TrustRegionSolver::minimize`] wraps it in the outer loop.

use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{NllsError, Result};
use crate::linalg::{mult_jt, norm2, svd_extremes};
use crate::problem::Problem;

use super::config::{ModelKind, Options, ScalingPolicy, StepMethod, TrUpdateStrategy};
use super::convergence::test_convergence;
use super::hessian::rank_one_update;
use super::inform::Inform;
use super::model::evaluate_model;
use super::step::StepStrategy;
use super::trust_region::TrustRegion;
use super::workspace::{SolverState, Workspace};

/// Result of a trust-region solve.
#[derive(Debug, Clone)]
pub struct TrResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Half the sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,

    /// Number of Jacobian evaluations
    pub jac_evals: usize,

    /// Number of exact Hessian evaluations
    pub hess_evals: usize,

    /// Whether a convergence test was met
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// Full diagnostics
    pub inform: Inform,
}

impl fmt::Display for TrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Jacobian evaluations: {}", self.jac_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The trust-region least-squares solver.
#[derive(Debug, Clone, Default)]
pub struct TrustRegionSolver {
    options: Options,
}

impl TrustRegionSolver {
    /// Create a solver with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with the given options.
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, maxit: usize) -> Self {
        self.options.maxit = maxit;
        self
    }

    /// Set the local model.
    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.options.model = model;
        self
    }

    /// Set the subproblem strategy.
    pub fn with_method(mut self, method: StepMethod) -> Self {
        self.options.nlls_method = method;
        self
    }

    /// Set the radius update policy.
    pub fn with_update_strategy(mut self, strategy: TrUpdateStrategy) -> Self {
        self.options.tr_update_strategy = strategy;
        self
    }

    /// Set the subproblem scaling policy.
    pub fn with_scaling(mut self, scale: ScalingPolicy) -> Self {
        self.options.scale = scale;
        self
    }

    /// Use the exact second derivatives supplied by the problem.
    pub fn with_exact_second_derivatives(mut self, exact: bool) -> Self {
        self.options.exact_second_derivatives = exact;
        self
    }

    /// Set the initial trust-region radius.
    pub fn with_initial_radius(mut self, radius: f64) -> Self {
        self.options.initial_radius = radius;
        self
    }

    /// Set the absolute and relative convergence tolerances.
    pub fn with_tolerances(mut self, absolute: f64, relative: f64) -> Self {
        self.options.stop_g_absolute = absolute;
        self.options.stop_g_relative = relative;
        self
    }

    /// Minimize `½‖f(x)‖²` starting from `initial_params`.
    ///
    /// Configuration problems (too few observations, a model the strategy
    /// cannot handle, bad dimensions, failing evaluations at the starting
    /// point) are returned as errors. Numerical failures during the solve give
    /// an unsuccessful [`TrResult`] whose `inform` records the cause.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    ///
    /// # Returns
    ///
    /// * `Result<TrResult>` - The result of the optimization
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<TrResult> {
        self.options.validate()?;

        let n = problem.parameter_count();
        if initial_params.len() != n {
            return Err(NllsError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n,
                initial_params.len()
            )));
        }
        let m = problem.residual_count();

        let mut workspace = Workspace::new(n, m, &self.options);
        let mut inform = Inform::default();
        let mut params = initial_params;
        let mut finished = false;

        for _ in 0..self.options.maxit {
            match self.iterate(problem, &mut params, &mut workspace, &mut inform) {
                Ok(true) => {}
                Ok(false) => {
                    finished = true;
                    break;
                }
                Err(e) if e.is_configuration_error() => return Err(e),
                Err(_) => {
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            let err = NllsError::MaxIterationsExceeded(format!(
                "stopped after {} iterations",
                self.options.maxit
            ));
            warn!("{}", err);
            inform.record_error(&err);
            workspace.state = SolverState::Failed;
        }

        let success = workspace.state == SolverState::Converged;
        let message = if success {
            workspace.convergence.description()
        } else {
            inform.error_message.clone()
        };
        info!(
            "trust region finished after {} iterations: {}",
            inform.iter, message
        );

        Ok(TrResult {
            params,
            residuals: workspace.f.clone(),
            cost: 0.5 * workspace.normf.powi(2),
            iterations: inform.iter,
            func_evals: inform.f_eval,
            jac_evals: inform.g_eval,
            hess_evals: inform.h_eval,
            success,
            message,
            inform,
        })
    }

    /// Perform one outer iteration.
    ///
    /// On the first call the workspace is initialized at `x`. Returns
    /// `Ok(true)` when the caller should iterate again and `Ok(false)` once a
    /// convergence test is met. Any error is also recorded in `inform`.
    pub fn iterate<P: Problem>(
        &self,
        problem: &P,
        x: &mut Array1<f64>,
        w: &mut Workspace,
        inform: &mut Inform,
    ) -> Result<bool> {
        match self.iterate_inner(problem, x, w, inform) {
            Ok(keep_going) => {
                if !keep_going {
                    w.state = SolverState::Converged;
                }
                Ok(keep_going)
            }
            Err(e) => {
                debug!("iteration {} failed: {}", w.iter, e);
                inform.record_error(&e);
                w.state = SolverState::Failed;
                Err(e)
            }
        }
    }

    fn iterate_inner<P: Problem>(
        &self,
        problem: &P,
        x: &mut Array1<f64>,
        w: &mut Workspace,
        inform: &mut Inform,
    ) -> Result<bool> {
        let options = &self.options;

        match w.state {
            SolverState::Uninitialized => {
                if self.initialize(problem, x, w, inform)? {
                    return Ok(false);
                }
            }
            SolverState::Iterating => {}
            SolverState::Converged => return Ok(false),
            SolverState::Failed => {
                return Err(NllsError::InvalidInput(
                    "the solve has already failed".to_string(),
                ))
            }
        }

        w.iter += 1;
        inform.iter = w.iter;

        let mut success = false;
        let mut no_reductions = 0;
        let mut normfnew = w.normf;

        while !success {
            no_reductions += 1;
            if no_reductions > options.max_tr_decrease + 1 {
                return Err(NllsError::MaxTrustRegionReductions(options.max_tr_decrease));
            }

            let step = w.step_solver.calculate_step(
                &w.j,
                &w.f,
                &w.hf,
                &w.g,
                w.trust_region.delta,
                options,
            )?;
            w.d = step.step;
            w.normd = step.norm;

            w.x_new = &*x + &w.d;
            w.fnew = problem.eval(&w.x_new)?;
            inform.f_eval += 1;
            if w.fnew.len() != w.f.len() {
                return Err(NllsError::DimensionMismatch(format!(
                    "expected {} residuals, got {}",
                    w.f.len(),
                    w.fnew.len()
                )));
            }
            normfnew = norm2(&w.fnew);

            let md = evaluate_model(&w.f, &w.j, &w.hf, &w.d, options.model, &mut w.model)?;
            let rho = TrustRegion::calculate_rho(w.normf, normfnew, md.md);

            if !rho.is_finite() || rho <= options.eta_successful {
                if w.use_second_derivatives
                    && options.model == ModelKind::Hybrid
                    && no_reductions == 1
                {
                    // judge the step by the Gauss-Newton model instead
                    let rho_gn = TrustRegion::calculate_rho(w.normf, normfnew, md.md_gn);
                    if rho_gn > options.eta_successful {
                        debug!("iteration {}: reverting to Gauss-Newton model", w.iter);
                        w.use_second_derivatives = false;
                        w.hf.fill(0.0);
                    }
                }
                debug!(
                    "iteration {}: step rejected, rho = {:.3e}, radius = {:.3e}",
                    w.iter, rho, w.trust_region.delta
                );
            } else {
                success = true;
            }

            w.trust_region.update_radius(rho, w.normd, options);

            if !success && norm2(&w.d) < f64::EPSILON * norm2(&w.x_new) {
                return Err(NllsError::NoProgress(format!(
                    "step of length {:.3e} is negligible",
                    norm2(&w.d)
                )));
            }
        }

        // accept the step
        x.assign(&w.x_new);
        std::mem::swap(&mut w.f, &mut w.fnew);

        if !w.exact_second_derivatives {
            // mixed gradient with the new residuals and the old Jacobian
            w.g_old.assign(&w.g);
            mult_jt(&w.j, &w.f, &mut w.g_mixed)?;
            w.g_mixed.mapv_inplace(|v| -v);
        }

        w.j = self.evaluate_jacobian(problem, x, w.f.len())?;
        inform.g_eval += 1;
        if options.calculate_svd_j {
            record_singular_values(&w.j, inform);
        }

        mult_jt(&w.j, &w.f, &mut w.g)?;
        w.g.mapv_inplace(|v| -v);

        w.normjf_old = w.normjf;
        w.normf = normfnew;
        w.normjf = norm2(&w.g);

        if !w.exact_second_derivatives {
            w.y = &w.g_old - &w.g;
            w.y_sharp = &w.g_mixed - &w.g;
        }

        if options.model == ModelKind::Hybrid {
            self.update_hybrid_state(w);
        }

        if w.use_second_derivatives {
            if w.exact_second_derivatives {
                w.hf = problem.hessian(x, &w.f)?;
                inform.h_eval += 1;
            } else {
                rank_one_update(&w.d, &w.y, &w.y_sharp, &mut w.hf);
            }
        }

        record_progress(w, inform, options);
        debug!(
            "iteration {}: ½‖f‖² = {:.6e}, ‖Jᵗf‖ = {:.6e}, radius = {:.3e}",
            w.iter, inform.obj, w.normjf, w.trust_region.delta
        );

        w.convergence = test_convergence(w.normf, w.normjf, w.normf0, w.normjf0, options, inform);
        Ok(!w.convergence.is_converged())
    }

    /// First-call setup. Returns true if the starting point already passes
    /// the convergence tests.
    fn initialize<P: Problem>(
        &self,
        problem: &P,
        x: &Array1<f64>,
        w: &mut Workspace,
        inform: &mut Inform,
    ) -> Result<bool> {
        let options = &self.options;
        let n = x.len();
        let m = problem.residual_count();

        if n > m {
            return Err(NllsError::TooFewObservations { n, m });
        }
        if problem.parameter_count() != n {
            return Err(NllsError::DimensionMismatch(format!(
                "problem has {} parameters but the starting point has {}",
                problem.parameter_count(),
                n
            )));
        }

        w.f = problem.eval(x)?;
        inform.f_eval += 1;
        if w.f.len() != m {
            return Err(NllsError::DimensionMismatch(format!(
                "expected {} residuals, got {}",
                m,
                w.f.len()
            )));
        }

        w.j = self.evaluate_jacobian(problem, x, m)?;
        inform.g_eval += 1;

        let delta = if options.relative_tr_radius {
            let max_column_norm2 = w
                .j
                .columns()
                .into_iter()
                .map(|col| col.dot(&col))
                .fold(0.0, f64::max);
            options.initial_radius_scale * max_column_norm2
        } else {
            options.initial_radius
        };
        w.trust_region = TrustRegion::new(delta, options);

        if options.calculate_svd_j {
            record_singular_values(&w.j, inform);
        }

        w.normf = norm2(&w.f);
        w.normf0 = w.normf;

        mult_jt(&w.j, &w.f, &mut w.g)?;
        w.g.mapv_inplace(|v| -v);
        w.normjf = norm2(&w.g);
        w.normjf0 = w.normjf;
        w.normjf_old = w.normjf;

        w.exact_second_derivatives =
            options.exact_second_derivatives && problem.has_exact_hessian();
        if options.exact_second_derivatives && !w.exact_second_derivatives {
            warn!("problem supplies no second derivatives, using the quasi-Newton approximation");
        }

        match options.model {
            ModelKind::GaussNewton => {
                w.hf.fill(0.0);
                w.use_second_derivatives = false;
            }
            ModelKind::Newton => {
                if w.exact_second_derivatives {
                    w.hf = problem.hessian(x, &w.f)?;
                    inform.h_eval += 1;
                } else {
                    w.hf.fill(0.0);
                }
                w.use_second_derivatives = true;
            }
            ModelKind::Hybrid => {
                w.hybrid_tol = options.hybrid_tol * (w.normjf / (0.5 * w.normf.powi(2)));
                w.hf.fill(0.0);
                w.hf_temp.fill(0.0);
                w.use_second_derivatives = false;
            }
        }
        if w.hf.dim() != (n, n) {
            return Err(NllsError::DimensionMismatch(format!(
                "Hessian term is {}x{} for {} parameters",
                w.hf.nrows(),
                w.hf.ncols(),
                n
            )));
        }

        w.state = SolverState::Iterating;
        record_progress(w, inform, options);
        debug!(
            "trust region start: n = {}, m = {}, radius = {:.3e}, model = {:?}, method = {:?}",
            n,
            m,
            delta,
            options.model,
            w.step_solver.method()
        );

        // nothing to do at an exact zero-residual point
        w.convergence = test_convergence(w.normf, w.normjf, w.normf0, w.normjf0, options, inform);
        Ok(w.convergence.is_converged())
    }

    fn evaluate_jacobian<P: Problem>(
        &self,
        problem: &P,
        x: &Array1<f64>,
        m: usize,
    ) -> Result<Array2<f64>> {
        let j = problem.jacobian(x)?;
        if j.dim() != (m, x.len()) {
            return Err(NllsError::DimensionMismatch(format!(
                "expected a {}x{} Jacobian, got {}x{}",
                m,
                x.len(),
                j.nrows(),
                j.ncols()
            )));
        }
        Ok(j)
    }

    /// Switch the hybrid model between first and second order and keep the
    /// stashed approximation up to date.
    fn update_hybrid_state(&self, w: &mut Workspace) {
        let options = &self.options;

        if w.use_second_derivatives {
            if w.normjf > w.normjf_old {
                debug!("iteration {}: gradient grew, switching to Gauss-Newton", w.iter);
                w.use_second_derivatives = false;
                w.hf_temp.assign(&w.hf);
                w.hf.fill(0.0);
            }
        } else if w.normjf / (0.5 * w.normf.powi(2)) < w.hybrid_tol {
            w.hybrid_count += 1;
            if w.hybrid_count == options.hybrid_switch_its {
                debug!("iteration {}: switching to second-order model", w.iter);
                w.use_second_derivatives = true;
                w.hybrid_count = 0;
                if !w.exact_second_derivatives {
                    w.hf.assign(&w.hf_temp);
                }
            }
        } else {
            w.hybrid_count = 0;
        }

        if !w.use_second_derivatives && !w.exact_second_derivatives {
            rank_one_update(&w.d, &w.y, &w.y_sharp, &mut w.hf_temp);
        }
    }
}

fn record_singular_values(j: &Array2<f64>, inform: &mut Inform) {
    let (smallest, largest) = svd_extremes(j);
    inform.smallest_sv = Some(smallest);
    inform.largest_sv = Some(largest);
}

fn record_progress(w: &Workspace, inform: &mut Inform, options: &Options) {
    inform.obj = 0.5 * w.normf.powi(2);
    inform.norm_g = w.normjf;
    inform.scaled_g = if w.normf > 0.0 {
        w.normjf / w.normf
    } else {
        0.0
    };
    if options.output_progress_vectors {
        inform.resvec.push(inform.obj);
        inform.gradvec.push(inform.norm_g);
    }
}
