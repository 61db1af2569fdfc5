//! Problem definition trait.
//!
//! This module defines the `Problem` trait, which represents the cost-function
//! collaborator of the trust-region solver: it supplies weighted residuals,
//! their Jacobian, and optionally the second-order term of the Hessian.

use crate::error::Result;
use ndarray::{Array1, Array2};

/// A trait representing a nonlinear least squares problem.
///
/// The solver minimises `½‖f(x)‖²` where `f` is the vector returned by
/// [`Problem::eval`]. Implementations are expected to apply any per-observation
/// weights themselves, so that `f = (calculated − observed) × weight`.
pub trait Problem {
    /// Evaluate the weighted residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The Jacobian is the m×n matrix of partial derivatives of the residuals
    /// with respect to the parameters, weighted the same way as the residuals.
    ///
    /// # Default Implementation
    ///
    /// Forward finite differences over [`Problem::eval`].
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Evaluate the second-order part of the Hessian, `Σ fᵢ ∇²fᵢ`.
    ///
    /// Problems that cannot supply second derivatives return a zero matrix,
    /// which is the default. The solver then relies on its quasi-Newton
    /// approximation instead.
    fn hessian(&self, _params: &Array1<f64>, _residuals: &Array1<f64>) -> Result<Array2<f64>> {
        let n = self.parameter_count();
        Ok(Array2::zeros((n, n)))
    }

    /// Whether [`Problem::hessian`] returns real second derivatives.
    fn has_exact_hessian(&self) -> bool {
        false
    }
}
