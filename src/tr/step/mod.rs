//! Trust-region subproblem solvers.
//!
//! Each strategy approximately solves
//!
//! ```text
//! min  vᵗd + ½ dᵗA d   subject to  ‖d‖ ≤ Δ,    A = JᵗJ + H,  v = Jᵗf
//! ```
//!
//! and owns the scratch buffers it needs. The driver picks one strategy when
//! the workspace is built and calls it through [`StepStrategy`].

pub mod aint;
pub mod dogleg;
pub mod dtrs;
pub mod more_sorensen;
pub mod roots;

use ndarray::{Array1, Array2};

use super::config::{Options, StepMethod};
use crate::error::{NllsError, Result};
use crate::linalg::{matmult_inner, mult_jt};

pub use aint::Aint;
pub use dogleg::DogLeg;
pub use dtrs::Dtrs;
pub use more_sorensen::MoreSorensen;

/// Outcome of one subproblem solve.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// The step, in the original (unscaled) variables
    pub step: Array1<f64>,

    /// Norm of the step in the variables the subproblem was solved in
    pub norm: f64,

    /// Lagrange multiplier (or shift) of the trust-region constraint
    pub multiplier: f64,

    /// Whether the hard case of the subproblem was met
    pub hard_case: bool,

    /// Inner iterations taken
    pub iterations: usize,
}

impl StepResult {
    pub(crate) fn new(step: Array1<f64>, norm: f64) -> Self {
        Self {
            step,
            norm,
            multiplier: 0.0,
            hard_case: false,
            iterations: 0,
        }
    }
}

/// A method for computing a trial step.
pub trait StepStrategy {
    /// Compute a step for the model built from `j`, `f` and `hf` inside a
    /// trust region of radius `delta`.
    ///
    /// # Arguments
    ///
    /// * `j` - Jacobian at the current point (m×n)
    /// * `f` - Residuals at the current point
    /// * `hf` - Second-order term of the Hessian (n×n)
    /// * `g` - Negative gradient `-Jᵗf`
    /// * `delta` - Trust-region radius
    /// * `options` - Solver options
    fn calculate_step(
        &mut self,
        j: &Array2<f64>,
        f: &Array1<f64>,
        hf: &Array2<f64>,
        g: &Array1<f64>,
        delta: f64,
        options: &Options,
    ) -> Result<StepResult>;
}

/// The configured strategy together with its private workspace.
#[derive(Debug, Clone)]
pub enum StepSolver {
    DogLeg(DogLeg),
    Aint(Aint),
    MoreSorensen(MoreSorensen),
    Dtrs(Dtrs),
}

impl StepSolver {
    /// Build the strategy named by `options.nlls_method` for a problem with
    /// `n` parameters and `m` residuals.
    pub fn new(n: usize, m: usize, options: &Options) -> Self {
        match options.nlls_method {
            StepMethod::DogLeg => StepSolver::DogLeg(DogLeg::new(n, m)),
            StepMethod::Aint => StepSolver::Aint(Aint::new(n)),
            StepMethod::MoreSorensen => StepSolver::MoreSorensen(MoreSorensen::new(n)),
            StepMethod::Dtrs => StepSolver::Dtrs(Dtrs::new(n)),
        }
    }

    /// The method this solver implements.
    pub fn method(&self) -> StepMethod {
        match self {
            StepSolver::DogLeg(_) => StepMethod::DogLeg,
            StepSolver::Aint(_) => StepMethod::Aint,
            StepSolver::MoreSorensen(_) => StepMethod::MoreSorensen,
            StepSolver::Dtrs(_) => StepMethod::Dtrs,
        }
    }
}

impl StepStrategy for StepSolver {
    fn calculate_step(
        &mut self,
        j: &Array2<f64>,
        f: &Array1<f64>,
        hf: &Array2<f64>,
        g: &Array1<f64>,
        delta: f64,
        options: &Options,
    ) -> Result<StepResult> {
        match self {
            StepSolver::DogLeg(s) => s.calculate_step(j, f, hf, g, delta, options),
            StepSolver::Aint(s) => s.calculate_step(j, f, hf, g, delta, options),
            StepSolver::MoreSorensen(s) => s.calculate_step(j, f, hf, g, delta, options),
            StepSolver::Dtrs(s) => s.calculate_step(j, f, hf, g, delta, options),
        }
    }
}

/// Form `A = JᵗJ + H` and `v = Jᵗf`.
pub(crate) fn build_subproblem(
    j: &Array2<f64>,
    f: &Array1<f64>,
    hf: &Array2<f64>,
    a: &mut Array2<f64>,
    v: &mut Array1<f64>,
) -> Result<()> {
    if hf.dim() != (j.ncols(), j.ncols()) {
        return Err(NllsError::DimensionMismatch(format!(
            "Hessian term is {}x{} for {} parameters",
            hf.nrows(),
            hf.ncols(),
            j.ncols()
        )));
    }
    matmult_inner(j, a);
    *a += hf;
    mult_jt(j, f, v)
}

/// Find `β` such that `‖a + β·b‖ = Δ`.
///
/// Of the two roots, the one that keeps the objective smallest is taken,
/// choosing the numerically stable form of the quadratic formula from the
/// sign of `aᵗb`.
pub fn find_beta(a: &Array1<f64>, b: &Array1<f64>, delta: f64) -> Result<f64> {
    let c = a.dot(b);
    let normb2 = b.dot(b);
    let normap = a.dot(a);
    let rhs = delta.powi(2) - normap;

    let discrim = c.powi(2) + normb2 * rhs;
    if discrim < 0.0 || normb2 == 0.0 {
        return Err(NllsError::FindBeta);
    }

    let beta = if c <= 0.0 {
        (-c + discrim.sqrt()) / normb2
    } else {
        rhs / (c + discrim.sqrt())
    };

    if beta.is_finite() {
        Ok(beta)
    } else {
        Err(NllsError::FindBeta)
    }
}
