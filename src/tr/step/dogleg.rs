//! Powell's dogleg step.
//!
//! The step follows the path from the origin to the Cauchy point and on to
//! the Gauss-Newton point, stopping where the path leaves the trust region.
//! Only the Gauss-Newton model is supported.

use log::debug;
use ndarray::{Array1, Array2};

use super::{find_beta, StepResult, StepStrategy};
use crate::error::{NllsError, Result};
use crate::linalg::{mult_j, norm2, solve_lls};
use crate::tr::config::{ModelKind, Options};

/// Scratch buffers for the dogleg step.
#[derive(Debug, Clone)]
pub struct DogLeg {
    jg: Array1<f64>,
    d_sd: Array1<f64>,
    d_gn: Array1<f64>,
}

impl DogLeg {
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            jg: Array1::zeros(m),
            d_sd: Array1::zeros(n),
            d_gn: Array1::zeros(n),
        }
    }
}

impl StepStrategy for DogLeg {
    fn calculate_step(
        &mut self,
        j: &Array2<f64>,
        f: &Array1<f64>,
        _hf: &Array2<f64>,
        g: &Array1<f64>,
        delta: f64,
        options: &Options,
    ) -> Result<StepResult> {
        if options.model != ModelKind::GaussNewton {
            return Err(NllsError::DoglegModel);
        }

        // Cauchy point along the steepest-descent direction g = -Jᵗf
        mult_j(j, g, &mut self.jg)?;
        let normjg = norm2(&self.jg);
        let normg = norm2(g);
        let alpha = if normjg > 0.0 {
            (normg / normjg).powi(2)
        } else {
            0.0
        };
        self.d_sd = g * alpha;

        solve_lls(j, f, &mut self.d_gn)?;

        let norm_gn = norm2(&self.d_gn);
        let norm_sd = alpha * normg;

        let step = if norm_gn <= delta {
            debug!("dogleg: Gauss-Newton step");
            self.d_gn.clone()
        } else if norm_sd >= delta {
            debug!("dogleg: scaled steepest-descent step");
            g * (delta / normg)
        } else {
            let diff = &self.d_gn - &self.d_sd;
            let beta = find_beta(&self.d_sd, &diff, delta)?;
            debug!("dogleg: interpolated step, β = {:.6e}", beta);
            &self.d_sd + &(diff * beta)
        };

        let norm = norm2(&step);
        Ok(StepResult::new(step, norm))
    }
}
