//! Finite difference methods for numerical differentiation.
//!
//! Used as the fallback Jacobian for problems that do not supply analytic
//! derivatives.

use crate::error::{NllsError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default step size for finite differences.
const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The step size for finite differences (optional)
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let residuals = problem.eval(params)?;
    jacobian_with(|p| problem.eval(p), params, &residuals, epsilon)
}

/// Forward-difference Jacobian of an arbitrary vector function, given its
/// value at `params`.
pub fn jacobian_with<F>(
    f: F,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = residuals.len();

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut params_perturbed = params.clone();

        // Adapt epsilon to parameter scale
        let param_j = params[j];
        let eps_j = if param_j.abs() > eps {
            param_j.abs() * eps
        } else {
            eps
        };

        params_perturbed[j] += eps_j;

        let residuals_perturbed = f(&params_perturbed)?;
        if residuals_perturbed.len() != n_residuals {
            return Err(NllsError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                residuals_perturbed.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    struct Quadratic;

    impl Problem for Quadratic {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(array![params[0] * params[0], params[0] * params[1], params[1]])
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_forward_difference_jacobian() {
        let params = array![2.0, -3.0];
        let jac = jacobian(&Quadratic, &params, None).unwrap();

        assert_eq!(jac.shape(), &[3, 2]);
        assert_relative_eq!(jac[[0, 0]], 4.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[0, 1]], 0.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 0]], -3.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 1]], 2.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[2, 1]], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_dimension_change_is_reported() {
        let params = array![1.0];
        let base = array![0.0, 0.0];
        let result = jacobian_with(|_| Ok(array![1.0]), &params, &base, None);
        assert!(matches!(result, Err(NllsError::DimensionMismatch(_))));
    }
}
