//! Curve fitting on top of the trust-region solver.
//!
//! A [`FitFunction`] describes a model `y = F(x; p)`. [`CurveFit`] pairs it with
//! observed data, per-point weights and a [`Parameters`] collection, and
//! implements [`Problem`] over the varying parameters only: the residuals are
//! `(calculated − observed) × weight`, the Jacobian rows are scaled by the same
//! weights, and columns of fixed parameters are dropped.

use ndarray::{Array1, Array2, Axis};

use crate::error::{NllsError, Result};
use crate::parameters::Parameters;
use crate::problem::Problem;
use crate::tr::{TrResult, TrustRegionSolver};
use crate::utils::finite_difference;

/// A model function of one independent variable.
pub trait FitFunction {
    /// Names of the model parameters, in the order `eval` expects them.
    fn parameter_names(&self) -> Vec<String>;

    /// Evaluate the model at every point of `x`.
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Derivatives of the model with respect to every parameter, one row per
    /// point. Defaults to forward finite differences.
    fn jacobian(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array2<f64>> {
        let values = self.eval(x, params)?;
        finite_difference::jacobian_with(|p| self.eval(x, p), params, &values, None)
    }

    /// `Σ cᵢ ∇²F(xᵢ; p)`, the coefficient-weighted sum of the per-point
    /// Hessians. Only called when [`FitFunction::has_hessian`] is true.
    fn hessian_sum(
        &self,
        _x: &Array1<f64>,
        params: &Array1<f64>,
        _coefficients: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        Ok(Array2::zeros((params.len(), params.len())))
    }

    /// Whether `hessian_sum` returns real second derivatives.
    fn has_hessian(&self) -> bool {
        false
    }

    /// A parameter collection with every parameter varying at `values`.
    fn parameters(&self, values: &[f64]) -> Result<Parameters> {
        let names = self.parameter_names();
        if names.len() != values.len() {
            return Err(NllsError::DimensionMismatch(format!(
                "Expected {} parameter values, got {}",
                names.len(),
                values.len()
            )));
        }
        let mut params = Parameters::new();
        for (name, &value) in names.iter().zip(values) {
            params.add_param(name, value)?;
        }
        Ok(params)
    }
}

/// Straight line `a·x + b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearFunction;

impl FitFunction for LinearFunction {
    fn parameter_names(&self) -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>> {
        check_len(params, 2)?;
        Ok(x.mapv(|xi| params[0] * xi + params[1]))
    }

    fn jacobian(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array2<f64>> {
        check_len(params, 2)?;
        let mut jac = Array2::zeros((x.len(), 2));
        for (i, &xi) in x.iter().enumerate() {
            jac[[i, 0]] = xi;
            jac[[i, 1]] = 1.0;
        }
        Ok(jac)
    }

    // the model is linear, so the zero default is exact
    fn has_hessian(&self) -> bool {
        true
    }
}

/// A line plus a Gaussian centred at the origin: `a·x + b + h·exp(−s·x²)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearPlusGaussian;

impl FitFunction for LinearPlusGaussian {
    fn parameter_names(&self) -> Vec<String> {
        ["a", "b", "h", "s"].iter().map(|s| s.to_string()).collect()
    }

    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>> {
        check_len(params, 4)?;
        let (a, b, h, s) = (params[0], params[1], params[2], params[3]);
        Ok(x.mapv(|xi| a * xi + b + h * (-s * xi * xi).exp()))
    }

    fn jacobian(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array2<f64>> {
        check_len(params, 4)?;
        let (h, s) = (params[2], params[3]);
        let mut jac = Array2::zeros((x.len(), 4));
        for (i, &xi) in x.iter().enumerate() {
            let x2 = xi * xi;
            let e = (-s * x2).exp();
            jac[[i, 0]] = xi;
            jac[[i, 1]] = 1.0;
            jac[[i, 2]] = e;
            jac[[i, 3]] = -h * x2 * e;
        }
        Ok(jac)
    }

    fn hessian_sum(
        &self,
        x: &Array1<f64>,
        params: &Array1<f64>,
        coefficients: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        check_len(params, 4)?;
        let (h, s) = (params[2], params[3]);
        let mut hs = 0.0;
        let mut ss = 0.0;
        for (&xi, &c) in x.iter().zip(coefficients.iter()) {
            let x2 = xi * xi;
            let e = (-s * x2).exp();
            hs -= c * x2 * e;
            ss += c * h * x2 * x2 * e;
        }
        let mut hess = Array2::zeros((4, 4));
        hess[[2, 3]] = hs;
        hess[[3, 2]] = hs;
        hess[[3, 3]] = ss;
        Ok(hess)
    }

    fn has_hessian(&self) -> bool {
        true
    }
}

fn check_len(params: &Array1<f64>, n: usize) -> Result<()> {
    if params.len() != n {
        return Err(NllsError::DimensionMismatch(format!(
            "Expected {} parameters, got {}",
            n,
            params.len()
        )));
    }
    Ok(())
}

/// A fit of a [`FitFunction`] to weighted data.
#[derive(Debug, Clone)]
pub struct CurveFit<F: FitFunction> {
    function: F,
    x_data: Array1<f64>,
    y_data: Array1<f64>,
    weights: Array1<f64>,
    params: Parameters,
    active: Vec<usize>,
}

impl<F: FitFunction> CurveFit<F> {
    /// Create a fit with unit weights.
    ///
    /// `params` must hold one entry per name in
    /// [`FitFunction::parameter_names`], in the same order.
    pub fn new(function: F, x_data: Array1<f64>, y_data: Array1<f64>, params: Parameters) -> Result<Self> {
        if x_data.len() != y_data.len() {
            return Err(NllsError::DimensionMismatch(format!(
                "x has {} points but y has {}",
                x_data.len(),
                y_data.len()
            )));
        }
        let expected = function.parameter_names();
        if params.names() != expected {
            return Err(NllsError::Parameter(format!(
                "expected parameters {:?}, got {:?}",
                expected,
                params.names()
            )));
        }

        let weights = Array1::ones(x_data.len());
        let active = params.varying_indices();
        Ok(Self {
            function,
            x_data,
            y_data,
            weights,
            params,
            active,
        })
    }

    /// Replace the per-point weights.
    pub fn with_weights(mut self, weights: Array1<f64>) -> Result<Self> {
        if weights.len() != self.x_data.len() {
            return Err(NllsError::DimensionMismatch(format!(
                "Expected {} weights, got {}",
                self.x_data.len(),
                weights.len()
            )));
        }
        self.weights = weights;
        Ok(self)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Positions of the varying parameters in the full parameter vector.
    pub fn active_indices(&self) -> &[usize] {
        &self.active
    }

    /// Fit the varying parameters and write the fitted values back.
    ///
    /// The parameters are left unchanged if the solve returns an error.
    pub fn fit(&mut self, solver: &TrustRegionSolver) -> Result<TrResult> {
        let initial = self.params.varying_values();
        let result = solver.minimize(&*self, initial)?;
        self.params.update_varying(&result.params)?;
        Ok(result)
    }

    fn full_params(&self, active: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.params.expand(active)?)
    }
}

impl<F: FitFunction> Problem for CurveFit<F> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let full = self.full_params(params)?;
        let calc = self.function.eval(&self.x_data, &full)?;
        if calc.len() != self.y_data.len() {
            return Err(NllsError::FunctionEvaluation(format!(
                "model returned {} values for {} points",
                calc.len(),
                self.y_data.len()
            )));
        }
        Ok((calc - &self.y_data) * &self.weights)
    }

    fn parameter_count(&self) -> usize {
        self.active.len()
    }

    fn residual_count(&self) -> usize {
        self.x_data.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let full = self.full_params(params)?;
        let jac = self.function.jacobian(&self.x_data, &full)?;
        let mut jac = jac.select(Axis(1), &self.active);
        for (mut row, &w) in jac.rows_mut().into_iter().zip(self.weights.iter()) {
            row *= w;
        }
        Ok(jac)
    }

    fn hessian(&self, params: &Array1<f64>, residuals: &Array1<f64>) -> Result<Array2<f64>> {
        let n = self.active.len();
        if !self.function.has_hessian() {
            return Ok(Array2::zeros((n, n)));
        }
        let full = self.full_params(params)?;
        // ∇²fᵢ = wᵢ∇²yᵢ, so Σ fᵢ∇²fᵢ = Σ (fᵢwᵢ)∇²yᵢ
        let coefficients = residuals * &self.weights;
        let hess = self
            .function
            .hessian_sum(&self.x_data, &full, &coefficients)?;
        Ok(hess
            .select(Axis(0), &self.active)
            .select(Axis(1), &self.active))
    }

    fn has_exact_hessian(&self) -> bool {
        self.function.has_hessian()
    }
}
