//! Solver state carried from one iteration to the next.

use ndarray::{Array1, Array2};

use super::config::Options;
use super::convergence::ConvergenceStatus;
use super::model::ModelWorkspace;
use super::step::StepSolver;
use super::trust_region::TrustRegion;

/// Lifecycle of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// No iteration has run yet
    Uninitialized,

    /// Iterations are in progress
    Iterating,

    /// A convergence test was met
    Converged,

    /// The solve stopped with an error
    Failed,
}

/// Buffers and scalars owned by one solve.
///
/// A workspace is sized for a fixed number of parameters and residuals and
/// holds the step strategy chosen from the options it was built with. It must
/// not be shared between solves that run at the same time.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub(crate) state: SolverState,
    pub(crate) iter: usize,

    pub(crate) f: Array1<f64>,
    pub(crate) fnew: Array1<f64>,
    pub(crate) j: Array2<f64>,
    pub(crate) hf: Array2<f64>,
    pub(crate) hf_temp: Array2<f64>,
    pub(crate) d: Array1<f64>,
    pub(crate) g: Array1<f64>,
    pub(crate) g_old: Array1<f64>,
    pub(crate) g_mixed: Array1<f64>,
    pub(crate) y: Array1<f64>,
    pub(crate) y_sharp: Array1<f64>,
    pub(crate) x_new: Array1<f64>,

    pub(crate) normf0: f64,
    pub(crate) normjf0: f64,
    pub(crate) normf: f64,
    pub(crate) normjf: f64,
    pub(crate) normjf_old: f64,
    pub(crate) normd: f64,

    pub(crate) hybrid_tol: f64,
    pub(crate) hybrid_count: usize,
    pub(crate) use_second_derivatives: bool,
    pub(crate) exact_second_derivatives: bool,

    pub(crate) trust_region: TrustRegion,
    pub(crate) step_solver: StepSolver,
    pub(crate) model: ModelWorkspace,
    pub(crate) convergence: ConvergenceStatus,
}

impl Workspace {
    /// Allocate a workspace for `n` parameters and `m` residuals.
    pub fn new(n: usize, m: usize, options: &Options) -> Self {
        Self {
            state: SolverState::Uninitialized,
            iter: 0,
            f: Array1::zeros(m),
            fnew: Array1::zeros(m),
            j: Array2::zeros((m, n)),
            hf: Array2::zeros((n, n)),
            hf_temp: Array2::zeros((n, n)),
            d: Array1::zeros(n),
            g: Array1::zeros(n),
            g_old: Array1::zeros(n),
            g_mixed: Array1::zeros(n),
            y: Array1::zeros(n),
            y_sharp: Array1::zeros(n),
            x_new: Array1::zeros(n),
            normf0: 0.0,
            normjf0: 0.0,
            normf: 0.0,
            normjf: 0.0,
            normjf_old: 0.0,
            normd: 0.0,
            hybrid_tol: 1.0,
            hybrid_count: 0,
            use_second_derivatives: false,
            exact_second_derivatives: false,
            trust_region: TrustRegion::new(options.initial_radius, options),
            step_solver: StepSolver::new(n, m, options),
            model: ModelWorkspace::new(n, m),
            convergence: ConvergenceStatus::Running,
        }
    }

    /// Prepare the workspace for a new solve of a problem with `n` parameters
    /// and `m` residuals. All buffers are reallocated.
    pub fn reset(&mut self, n: usize, m: usize, options: &Options) {
        *self = Self::new(n, m, options);
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Current trust-region radius.
    pub fn radius(&self) -> f64 {
        self.trust_region.delta
    }

    /// Residuals at the current point.
    pub fn residuals(&self) -> &Array1<f64> {
        &self.f
    }

    /// Jacobian at the current point.
    pub fn jacobian(&self) -> &Array2<f64> {
        &self.j
    }

    /// Second-order Hessian term used by the model.
    pub fn hessian_term(&self) -> &Array2<f64> {
        &self.hf
    }

    /// Whether the model currently includes second-order information.
    pub fn uses_second_derivatives(&self) -> bool {
        self.use_second_derivatives
    }

    /// Whether the second-order term comes from the problem rather than from
    /// the quasi-Newton update.
    pub fn uses_exact_hessian(&self) -> bool {
        self.exact_second_derivatives
    }

    /// Outcome of the most recent convergence test.
    pub fn convergence(&self) -> ConvergenceStatus {
        self.convergence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tr::config::StepMethod;

    #[test]
    fn test_reset_resizes_and_rebuilds_strategy() {
        let options = Options::default();
        let mut w = Workspace::new(2, 5, &options);
        assert_eq!(w.jacobian().dim(), (5, 2));
        assert_eq!(w.state(), SolverState::Uninitialized);
        assert_eq!(w.radius(), options.initial_radius);

        w.state = SolverState::Failed;
        let options = Options {
            nlls_method: StepMethod::MoreSorensen,
            ..Options::default()
        };
        w.reset(3, 4, &options);
        assert_eq!(w.state(), SolverState::Uninitialized);
        assert_eq!(w.hessian_term().dim(), (3, 3));
        assert_eq!(w.residuals().len(), 4);
        assert_eq!(w.step_solver.method(), StepMethod::MoreSorensen);
        assert!(!w.uses_second_derivatives());
    }
}
