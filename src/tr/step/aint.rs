//! Adachi-Iwata-Nakatsukasa-Takeda step.
//!
//! The optimal multiplier of the trust-region subproblem is the rightmost real
//! eigenvalue of the 2n×2n matrix
//!
//! ```text
//! M = [ -A   v·vᵗ/Δ² ]
//!     [  I   -A      ]
//! ```
//!
//! so a single nonsymmetric eigenvalue computation replaces the secular
//! iteration.

use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

use super::{build_subproblem, find_beta, StepResult, StepStrategy};
use crate::error::{NllsError, Result};
use crate::linalg::{min_eig_symm, norm2, shift_matrix, solve_lls, solve_spd};
use crate::tr::config::Options;

/// Eigenvalues with a relative imaginary part below this count as real.
const REAL_TOLERANCE: f64 = 1e-10;

/// Scratch buffers for the AINT step.
#[derive(Debug, Clone)]
pub struct Aint {
    a: Array2<f64>,
    ahat: Array2<f64>,
    v: Array1<f64>,
    neg_v: Array1<f64>,
}

impl Aint {
    pub fn new(n: usize) -> Self {
        Self {
            a: Array2::zeros((n, n)),
            ahat: Array2::zeros((n, n)),
            v: Array1::zeros(n),
            neg_v: Array1::zeros(n),
        }
    }

    /// Rightmost real eigenvalue of the AINT matrix.
    fn rightmost_real_eigenvalue(&self, delta: f64) -> Result<f64> {
        let n = self.a.nrows();
        let vvt_scale = 1.0 / delta.powi(2);
        let m = DMatrix::from_fn(2 * n, 2 * n, |row, col| match (row < n, col < n) {
            (true, true) => -self.a[[row, col]],
            (true, false) => self.v[row] * self.v[col - n] * vvt_scale,
            (false, true) => {
                if row - n == col {
                    1.0
                } else {
                    0.0
                }
            }
            (false, false) => -self.a[[row - n, col - n]],
        });

        m.complex_eigenvalues()
            .iter()
            .filter(|z| z.im.abs() <= REAL_TOLERANCE * z.re.abs().max(1.0))
            .map(|z| z.re)
            .fold(None, |best: Option<f64>, re| match best {
                Some(b) if b >= re => Some(b),
                _ => Some(re),
            })
            .ok_or(NllsError::AintEigImag)
    }
}

impl StepStrategy for Aint {
    fn calculate_step(
        &mut self,
        j: &Array2<f64>,
        f: &Array1<f64>,
        hf: &Array2<f64>,
        _g: &Array1<f64>,
        delta: f64,
        _options: &Options,
    ) -> Result<StepResult> {
        build_subproblem(j, f, hf, &mut self.a, &mut self.v)?;
        self.neg_v = -&self.v;

        let mut d = Array1::zeros(self.v.len());
        match solve_spd(&self.a, &self.neg_v, &mut d) {
            Ok(_) => {
                let norm = norm2(&d);
                if norm <= delta {
                    debug!("aint: interior Newton step");
                    return Ok(StepResult::new(d, norm));
                }
            }
            Err(NllsError::NotPositiveDefinite) => {}
            Err(e) => return Err(e),
        }

        let lambda = self.rightmost_real_eigenvalue(delta)?;
        shift_matrix(&self.a, lambda, &mut self.ahat);

        let mut hard_case = false;
        match solve_spd(&self.ahat, &self.neg_v, &mut d) {
            Ok(_) => {}
            Err(NllsError::NotPositiveDefinite) => {
                // A + λI is singular: minimum-norm solution plus a move along
                // the leftmost eigenvector
                hard_case = true;
                solve_lls(&self.ahat, &self.v, &mut d)?;
                let (_, y1) = min_eig_symm(&self.a)?;
                let beta = find_beta(&d, &y1, delta)?;
                d.scaled_add(beta, &y1);
            }
            Err(e) => return Err(e),
        }

        let norm = norm2(&d);
        debug!(
            "aint: λ = {:.6e}, ‖d‖ = {:.6e}{}",
            lambda,
            norm,
            if hard_case { ", hard case" } else { "" }
        );

        Ok(StepResult {
            step: d,
            norm,
            multiplier: lambda,
            hard_case,
            iterations: 0,
        })
    }
}
