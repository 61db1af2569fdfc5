//! More-Sorensen step.
//!
//! Newton's method on the secular equation `1/‖d(σ)‖ = 1/Δ`, where
//! `(A + σI)·d(σ) = -v`, with each trial shift checked by a Cholesky
//! factorization. An indefinite `A` is handled by first shifting past its
//! leftmost eigenvalue.

use log::{debug, trace};
use ndarray::{Array1, Array2};

use super::{build_subproblem, find_beta, StepResult, StepStrategy};
use crate::error::{NllsError, Result};
use crate::linalg::{
    min_eig_symm, norm2, shift_matrix, solve_spd, solve_with_lower_factor, CholeskyFactor,
};
use crate::tr::config::{Options, ScalingPolicy};
use crate::tr::scaling::{apply_scaling, unscale_step, ScalingWorkspace};

/// Attempts at finding a positive-definite shift before giving up.
const MAX_SHIFTS: i32 = 10;

/// Step strategy based on shifted Cholesky factorizations.
#[derive(Debug, Clone)]
pub struct MoreSorensen {
    a: Array2<f64>,
    ahat: Array2<f64>,
    factor: Option<CholeskyFactor>,
    v: Array1<f64>,
    neg_v: Array1<f64>,
    q: Array1<f64>,
    scaling: ScalingWorkspace,
}

impl MoreSorensen {
    pub fn new(n: usize) -> Self {
        Self {
            a: Array2::zeros((n, n)),
            ahat: Array2::zeros((n, n)),
            factor: None,
            v: Array1::zeros(n),
            neg_v: Array1::zeros(n),
            q: Array1::zeros(n),
            scaling: ScalingWorkspace::new(n),
        }
    }
}

/// Increase `sigma` until `A + σI` is positive definite, returning its Cholesky
/// factor and leaving the solution of `(A + σI)·d = -v` in `d`.
fn get_pd_shift(
    a: &Array2<f64>,
    neg_v: &Array1<f64>,
    ahat: &mut Array2<f64>,
    d: &mut Array1<f64>,
    sigma: &mut f64,
    options: &Options,
) -> Result<CholeskyFactor> {
    let mut no_shifts = 0;
    loop {
        shift_matrix(a, *sigma, ahat);
        match solve_spd(ahat, neg_v, d) {
            Ok(factor) => {
                trace!("more-sorensen: σ = {:.6e} after {} shift(s)", sigma, no_shifts);
                return Ok(factor);
            }
            Err(NllsError::NotPositiveDefinite) => {}
            Err(e) => return Err(e),
        }
        no_shifts += 1;
        if no_shifts == MAX_SHIFTS {
            return Err(NllsError::TooManyShifts);
        }
        *sigma += 10.0_f64.powi(no_shifts) * options.more_sorensen_shift;
    }
}

impl StepStrategy for MoreSorensen {
    fn calculate_step(
        &mut self,
        j: &Array2<f64>,
        f: &Array1<f64>,
        hf: &Array2<f64>,
        _g: &Array1<f64>,
        delta: f64,
        options: &Options,
    ) -> Result<StepResult> {
        build_subproblem(j, f, hf, &mut self.a, &mut self.v)?;

        let scaled = options.scale != ScalingPolicy::None;
        if scaled {
            apply_scaling(j, &mut self.a, &mut self.v, &mut self.scaling, options)?;
        }
        self.neg_v = -&self.v;

        let mut d = Array1::zeros(self.v.len());
        let mut sigma;
        let mut y1: Option<Array1<f64>> = None;

        match solve_spd(&self.a, &self.neg_v, &mut d) {
            Ok(factor) => {
                self.factor = Some(factor);
                sigma = 0.0;
            }
            Err(NllsError::NotPositiveDefinite) => {
                let (sigma_min, eigenvector) = min_eig_symm(&self.a)?;
                debug!("more-sorensen: indefinite, leftmost eigenvalue {:.6e}", sigma_min);
                y1 = Some(eigenvector);
                sigma = -(sigma_min - options.more_sorensen_shift);
                self.factor = Some(get_pd_shift(
                    &self.a,
                    &self.neg_v,
                    &mut self.ahat,
                    &mut d,
                    &mut sigma,
                    options,
                )?);
            }
            Err(e) => return Err(e),
        }

        let mut nd = norm2(&d);
        if !nd.is_finite() {
            return Err(NllsError::NoProgress(
                "More-Sorensen step is not finite".to_string(),
            ));
        }

        let epsilon = (options.more_sorensen_tol * delta).max(options.more_sorensen_tiny);
        let mut no_restarts = 0;
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..options.more_sorensen_maxits {
            if nd <= delta + epsilon {
                // inside the region, or close enough to its boundary
                if sigma.abs() < options.more_sorensen_tiny || (nd - delta).abs() < epsilon {
                    converged = true;
                    break;
                }
                if let Some(y1) = &y1 {
                    if let Ok(beta) = find_beta(&d, y1, delta) {
                        d.scaled_add(beta, y1);
                    }
                }
                converged = true;
                break;
            }

            let factor = self.factor.as_ref().ok_or(NllsError::NotPositiveDefinite)?;
            self.q = solve_with_lower_factor(factor, &d)?;
            let nq = norm2(&self.q);
            let sigma_shift = (nd / nq).powi(2) * ((nd - delta) / delta);

            if sigma_shift.abs() < options.more_sorensen_tiny * sigma.abs() {
                if no_restarts < 1 {
                    // find a new starting point
                    self.factor = Some(get_pd_shift(
                        &self.a,
                        &self.neg_v,
                        &mut self.ahat,
                        &mut d,
                        &mut sigma,
                        options,
                    )?);
                    no_restarts += 1;
                } else {
                    return Err(NllsError::NoProgress(
                        "More-Sorensen shift correction is negligible".to_string(),
                    ));
                }
            } else {
                sigma += sigma_shift;
            }

            shift_matrix(&self.a, sigma, &mut self.ahat);
            self.factor = Some(solve_spd(&self.ahat, &self.neg_v, &mut d)?);
            nd = norm2(&d);
            iterations += 1;
            trace!("more-sorensen: iter {} σ = {:.6e} ‖d‖ = {:.6e}", iterations, sigma, nd);
        }

        if !converged {
            return Err(NllsError::MaxIterationsExceeded(format!(
                "More-Sorensen did not converge in {} iterations",
                options.more_sorensen_maxits
            )));
        }

        let norm = norm2(&d);
        if scaled {
            unscale_step(&mut d, &self.scaling);
        }
        debug!("more-sorensen: ‖d‖ = {:.6e}, σ = {:.6e}", norm, sigma);

        Ok(StepResult {
            step: d,
            norm,
            multiplier: sigma,
            hard_case: false,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_spd_fast_path() {
        let j = Array2::eye(2);
        let f = array![0.1, -0.2];
        let hf = Array2::zeros((2, 2));
        let g = -&f;
        let mut ms = MoreSorensen::new(2);

        let result = ms
            .calculate_step(&j, &f, &hf, &g, 10.0, &Options::default())
            .unwrap();
        assert_eq!(result.multiplier, 0.0);
        assert_eq!(result.iterations, 0);
        assert_relative_eq!(result.step[0], -0.1, epsilon = 1e-14);
        assert_relative_eq!(result.step[1], 0.2, epsilon = 1e-14);
    }

    #[test]
    fn test_indefinite_matrix_reaches_boundary() {
        // A = JᵗJ + H = diag(2, -1)
        let j = Array2::eye(2);
        let f = array![1.0, 1.0];
        let hf = array![[1.0, 0.0], [0.0, -2.0]];
        let g = -&f;
        let delta = 0.5;
        let options = Options {
            scale: ScalingPolicy::None,
            ..Options::default()
        };
        let mut ms = MoreSorensen::new(2);

        let result = ms.calculate_step(&j, &f, &hf, &g, delta, &options).unwrap();
        let tol = (options.more_sorensen_tol * delta).max(options.more_sorensen_tiny);
        assert!((result.norm - delta).abs() <= tol);
        assert!(result.multiplier > 1.0);
    }

    #[test]
    fn test_iteration_cap() {
        let j = Array2::eye(2);
        let f = array![1.0, 1.0];
        let hf = array![[1.0, 0.0], [0.0, -2.0]];
        let g = -&f;
        let options = Options {
            scale: ScalingPolicy::None,
            more_sorensen_maxits: 1,
            ..Options::default()
        };
        let mut ms = MoreSorensen::new(2);

        let err = ms.calculate_step(&j, &f, &hf, &g, 0.5, &options).unwrap_err();
        assert!(matches!(err, NllsError::MaxIterationsExceeded(_)));
    }
}
