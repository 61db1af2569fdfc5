//! Diagonal trust-region subproblem solver.
//!
//! After an eigendecomposition `A = V·diag(h)·Vᵗ` the subproblem becomes
//!
//! ```text
//! min  f + cᵗx + ½ Σ hᵢxᵢ²   subject to  ‖x‖ ≤ radius
//! ```
//!
//! with `c = Vᵗv`. The solution is `xᵢ = -cᵢ/(hᵢ + λ)` for the multiplier
//! `λ ≥ max(0, -min h)` that puts `x` on the boundary, unless the
//! unconstrained minimizer is already inside. `λ` is found with a safeguarded
//! iteration on the secular equation that combines a Newton correction with
//! two cubic Taylor corrections, each of which underestimates the root.

use log::{debug, trace, warn};
use ndarray::{Array1, Array2};

use super::roots::roots_cubic;
use super::{build_subproblem, StepResult, StepStrategy};
use crate::error::{NllsError, Result};
use crate::linalg::{all_eig_symm, ensure_len, norm2};
use crate::tr::config::{Options, ScalingPolicy};
use crate::tr::inform::Status;
use crate::tr::scaling::{apply_scaling, unscale_step, ScalingWorkspace};

/// Upper bound on secular-equation iterations.
const MAX_ITERATIONS: usize = 100;

/// Number of `(λ, ‖x‖)` pairs kept for diagnostics.
const HISTORY_MAX: usize = 100;

/// Return code reported when the core solver fails.
pub const ILL_CONDITIONED_CODE: i32 = -16;

/// Controls for [`dtrs_solve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtrsControl {
    /// Relative tolerance on `|‖x‖ - radius|`
    pub stop_normal: f64,

    /// Absolute tolerance on `|‖x‖ - radius|`
    pub stop_absolute_normal: f64,

    /// Highest order of Taylor correction used (1 or 3)
    pub taylor_max_degree: usize,

    /// Entries of `h` and `c` smaller than this relative to the largest are
    /// treated as zero
    pub h_min: f64,

    /// Require the solution to lie on the boundary
    pub equality_problem: bool,
}

impl Default for DtrsControl {
    fn default() -> Self {
        Self {
            stop_normal: f64::EPSILON.powf(0.75),
            stop_absolute_normal: f64::EPSILON.powf(0.75),
            taylor_max_degree: 3,
            h_min: f64::EPSILON,
            equality_problem: false,
        }
    }
}

/// One entry of the iteration history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtrsHistory {
    pub lambda: f64,
    pub x_norm: f64,
}

/// Diagnostics of a [`dtrs_solve`] call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DtrsInform {
    /// `Ok`, or `IllConditioned` if the multiplier left its bracket
    pub status: Status,

    /// Iterations taken
    pub iter: usize,

    /// Value of the quadratic objective at the solution
    pub obj: f64,

    /// Multiplier of the trust-region constraint
    pub multiplier: f64,

    /// Norm of the solution
    pub x_norm: f64,

    /// Whether the hard case occurred
    pub hard_case: bool,

    /// `(λ, ‖x‖)` at each iteration
    pub history: Vec<DtrsHistory>,
}

/// Fortran-style sign transfer.
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// Derivatives of `π(λ) = ‖x(λ)‖^β` given those of `‖x(λ)‖²`.
///
/// `x_norm2[k]` holds the k-th derivative of `‖x‖²`; the first `max_order + 1`
/// entries of `pi_beta` are filled.
fn pi_derivs(max_order: usize, beta: f64, x_norm2: &[f64; 4], pi_beta: &mut [f64; 4]) {
    let hbeta = 0.5 * beta;
    pi_beta[0] = x_norm2[0].powf(hbeta);
    pi_beta[1] = hbeta * x_norm2[0].powf(hbeta - 1.0) * x_norm2[1];
    if max_order == 1 {
        return;
    }
    pi_beta[2] = hbeta
        * x_norm2[0].powf(hbeta - 2.0)
        * ((hbeta - 1.0) * x_norm2[1].powi(2) + x_norm2[0] * x_norm2[2]);
    if max_order == 2 {
        return;
    }
    pi_beta[3] = hbeta
        * x_norm2[0].powf(hbeta - 3.0)
        * (x_norm2[3] * x_norm2[0].powi(2)
            + (hbeta - 1.0)
                * (3.0 * x_norm2[0] * x_norm2[1] * x_norm2[2]
                    + (hbeta - 2.0) * x_norm2[1].powi(3)));
}

/// Σ cᵢ² / (hᵢ + λ)^power.
fn weighted_sum(c: &Array1<f64>, h: &Array1<f64>, lambda: f64, power: i32) -> f64 {
    c.iter()
        .zip(h.iter())
        .map(|(&ci, &hi)| ci.powi(2) / (hi + lambda).powi(power))
        .sum()
}

/// Solve the diagonal subproblem.
///
/// `h` and `c` are first scaled by their largest entries; entries that are
/// tiny relative to the largest are dropped. The core solver runs on the
/// scaled data and its results are mapped back.
///
/// # Arguments
///
/// * `radius` - Trust-region radius
/// * `f` - Constant term of the objective
/// * `c` - Linear term
/// * `h` - Diagonal of the quadratic term
/// * `x` - Receives the solution
/// * `control` - Tolerances
pub fn dtrs_solve(
    radius: f64,
    f: f64,
    c: &Array1<f64>,
    h: &Array1<f64>,
    x: &mut Array1<f64>,
    control: &DtrsControl,
) -> DtrsInform {
    let scale_of = |v: &Array1<f64>| -> (f64, Array1<f64>) {
        let largest = v.iter().fold(0.0_f64, |acc, vi| acc.max(vi.abs()));
        if largest > 0.0 {
            let threshold = control.h_min * largest;
            let scaled = v.mapv(|vi| {
                if vi.abs() >= threshold {
                    vi / largest
                } else {
                    0.0
                }
            });
            (largest, scaled)
        } else {
            (1.0, Array1::zeros(v.len()))
        }
    };

    let (scale_h, h_scale) = scale_of(h);
    let (scale_c, c_scale) = scale_of(c);

    let radius_scale = (scale_h / scale_c) * radius;
    let f_scale = (f * scale_h) / scale_c.powi(2);

    let mut inform = dtrs_solve_main(radius_scale, f_scale, &c_scale, &h_scale, x, control);

    let x_factor = scale_c / scale_h;
    x.mapv_inplace(|xi| xi * x_factor);
    inform.x_norm *= x_factor;
    inform.obj *= scale_c.powi(2) / scale_h;
    inform.multiplier *= scale_h;
    for entry in inform.history.iter_mut() {
        entry.lambda *= scale_h;
        entry.x_norm *= x_factor;
    }

    inform
}

/// Move `lambda` off `-λ_min` by `√c2/radius`, and by at least one relative
/// machine epsilon so that the shift survives rounding.
fn shift_past_singularity(lambda: f64, c2: f64, radius: f64) -> f64 {
    lambda + (c2.sqrt() / radius).max(lambda * f64::EPSILON)
}

/// Core secular-equation solver on already-scaled data.
fn dtrs_solve_main(
    radius: f64,
    f: f64,
    c: &Array1<f64>,
    h: &Array1<f64>,
    x: &mut Array1<f64>,
    control: &DtrsControl,
) -> DtrsInform {
    let n = c.len();
    let mut inform = DtrsInform::default();
    ensure_len(x, n);
    x.fill(0.0);
    if n == 0 {
        inform.obj = f;
        return inform;
    }

    let c_norm = norm2(c);
    let lambda_min = h.iter().copied().fold(f64::INFINITY, f64::min);
    let lambda_max = h.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // zero gradient and convex: the origin is optimal
    if c_norm == 0.0 && lambda_min >= 0.0 {
        if control.equality_problem {
            if let Some(i_hard) = h.iter().position(|&hi| hi == lambda_min) {
                x[i_hard] = radius;
            }
            inform.x_norm = radius;
            inform.obj = f + 0.5 * lambda_min * radius.powi(2);
            inform.multiplier = -lambda_min;
        } else {
            inform.obj = f;
        }
        return inform;
    }

    // bracket the multiplier
    let mut lambda_l = 0.0_f64.max(-lambda_min).max(c_norm / radius - lambda_max);
    let lambda_u = 0.0_f64.max(c_norm / radius - lambda_min);
    let mut lambda = lambda_l;

    if lambda == -lambda_min {
        let mut c2 = 0.0;
        let mut i_hard = 0;
        let mut hard_case = true;
        for i in 0..n {
            if h[i] == lambda_min {
                if c[i].abs() > f64::EPSILON * c_norm {
                    hard_case = false;
                    c2 += c[i].powi(2);
                } else {
                    i_hard = i;
                }
            }
        }

        if hard_case {
            for i in 0..n {
                x[i] = if h[i] != lambda_min {
                    -c[i] / (h[i] + lambda)
                } else {
                    0.0
                };
            }
            let mut x_norm = norm2(x);

            if x_norm <= radius {
                trace!("dtrs: hard case, ‖x‖ = {:.3e} within radius {:.3e}", x_norm, radius);
                if x_norm < radius {
                    // move along the null direction to the boundary
                    let utx = x[i_hard] / radius;
                    let distx = (radius - x_norm) * ((radius + x_norm) / radius);
                    let alpha = sign(
                        distx / (utx.abs() + (utx.powi(2) + distx / radius).sqrt()),
                        utx,
                    );
                    x[i_hard] += alpha;
                }
                x_norm = norm2(x);
                inform.x_norm = x_norm;
                inform.obj = f + 0.5 * (c.dot(x) - lambda * radius.powi(2));
                inform.multiplier = lambda;
                inform.hard_case = true;
                return inform;
            }

            // the candidate overshoots: a Newton step on ‖x‖² = radius² from
            // the left still underestimates the root
            let w_norm2: f64 = (0..n)
                .filter(|&i| h[i] != lambda_min)
                .map(|i| c[i].powi(2) / (h[i] + lambda).powi(3))
                .sum();
            let x_norm2_1 = -2.0 * w_norm2;
            lambda -= (x_norm.powi(2) - radius.powi(2)) / x_norm2_1;
            lambda_l = lambda;
        } else {
            lambda = shift_past_singularity(lambda, c2, radius);
            lambda_l = lambda;
        }
    }

    let max_order = control.taylor_max_degree.max(1);
    let roots_tol = 10.0 * f64::EPSILON;
    let mut x_norm2 = [0.0_f64; 4];
    let mut pi_beta = [0.0_f64; 4];
    let mut converged = false;

    for iter in 0..MAX_ITERATIONS {
        inform.iter = iter + 1;

        for i in 0..n {
            x[i] = -c[i] / (h[i] + lambda);
        }
        x_norm2[0] = x.dot(x);
        let x_norm = x_norm2[0].sqrt();
        inform.x_norm = x_norm;

        // interior solution
        if lambda == 0.0 && x_norm <= radius {
            inform.obj = f + 0.5 * c.dot(x);
            inform.multiplier = 0.0;
            return inform;
        }

        // boundary solution
        if (x_norm - radius).abs()
            <= (control.stop_normal * radius).max(control.stop_absolute_normal)
        {
            converged = true;
            break;
        }

        lambda_l = lambda_l.max(lambda);
        if inform.history.len() < HISTORY_MAX {
            inform.history.push(DtrsHistory { lambda, x_norm });
        }
        trace!("dtrs: iter {} λ = {:.6e} ‖x‖ = {:.6e}", iter, lambda, x_norm);

        if lambda > lambda_u {
            inform.status = Status::IllConditioned;
            break;
        }

        let w_norm2 = weighted_sum(c, h, lambda, 3);
        x_norm2[1] = -2.0 * w_norm2;

        // Newton correction on 1/‖x‖
        let mut lambda_new: Vec<f64> = Vec::with_capacity(3);
        let beta = -1.0;
        pi_derivs(1, beta, &x_norm2, &mut pi_beta);
        let delta_lambda = -(pi_beta[0] - radius.powf(beta)) / pi_beta[1];
        lambda_new.push(lambda + delta_lambda);

        if max_order >= 3 {
            let z_norm2 = weighted_sum(c, h, lambda, 4);
            x_norm2[2] = 6.0 * z_norm2;
            let v_norm2 = weighted_sum(c, h, lambda, 5);
            x_norm2[3] = -24.0 * v_norm2;

            for beta in [2.0, -0.4] {
                pi_derivs(3, beta, &x_norm2, &mut pi_beta);
                let mut a = [
                    pi_beta[0] - radius.powf(beta),
                    pi_beta[1],
                    0.5 * pi_beta[2],
                    pi_beta[3] / 6.0,
                ];
                let a_max = a.iter().fold(0.0_f64, |acc, ai| acc.max(ai.abs()));
                if a_max > 0.0 {
                    for ai in a.iter_mut() {
                        *ai /= a_max;
                    }
                }
                let roots = roots_cubic(a[0], a[1], a[2], a[3], roots_tol);
                let correction = if roots.nroots == 3 {
                    roots.root3
                } else {
                    roots.root1
                };
                lambda_new.push(lambda + correction);
            }
        }

        let lambda_plus = lambda_new
            .iter()
            .copied()
            .filter(|l| l.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        if !lambda_plus.is_finite() {
            inform.status = Status::IllConditioned;
            break;
        }
        let delta_lambda = lambda_plus - lambda;
        lambda = lambda_plus;
        lambda_l = lambda_l.max(lambda_plus);

        if delta_lambda.abs() < f64::EPSILON * lambda.abs().max(1.0) {
            converged = true;
            break;
        }
    }

    if !converged && inform.status.is_ok() {
        warn!(
            "dtrs: stopped after {} iterations with |‖x‖ - radius| = {:.3e}",
            MAX_ITERATIONS,
            (inform.x_norm - radius).abs()
        );
    }

    inform.obj = f + 0.5 * (c.dot(x) - lambda * radius.powi(2));
    inform.multiplier = lambda;
    inform
}

/// Step strategy that solves the subproblem exactly in the eigenbasis of `A`.
#[derive(Debug, Clone)]
pub struct Dtrs {
    a: Array2<f64>,
    v: Array1<f64>,
    ew: Array1<f64>,
    ev: Array2<f64>,
    v_trans: Array1<f64>,
    d_trans: Array1<f64>,
    scaling: ScalingWorkspace,
    control: DtrsControl,

    /// Diagnostics of the last call
    pub last_inform: DtrsInform,
}

impl Dtrs {
    pub fn new(n: usize) -> Self {
        Self {
            a: Array2::zeros((n, n)),
            v: Array1::zeros(n),
            ew: Array1::zeros(n),
            ev: Array2::zeros((n, n)),
            v_trans: Array1::zeros(n),
            d_trans: Array1::zeros(n),
            scaling: ScalingWorkspace::new(n),
            control: DtrsControl::default(),
            last_inform: DtrsInform::default(),
        }
    }

    /// Replace the default controls of the core solver.
    pub fn with_control(mut self, control: DtrsControl) -> Self {
        self.control = control;
        self
    }
}

impl StepStrategy for Dtrs {
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

        all_eig_symm(&self.a, &mut self.ew, &mut self.ev)?;
        self.v_trans = self.ev.t().dot(&self.v);

        for vi in self.v_trans.iter_mut() {
            if vi.abs() < f64::EPSILON {
                *vi = 0.0;
            }
        }
        for ewi in self.ew.iter_mut() {
            if ewi.abs() < f64::EPSILON {
                *ewi = 0.0;
            }
        }

        let inform = dtrs_solve(
            delta,
            0.0,
            &self.v_trans,
            &self.ew,
            &mut self.d_trans,
            &self.control,
        );
        if !inform.status.is_ok() {
            self.last_inform = inform;
            return Err(NllsError::FromExternalSolver {
                routine: "dtrs_solve".to_string(),
                code: ILL_CONDITIONED_CODE,
            });
        }

        let mut step = self.ev.dot(&self.d_trans);
        let norm = norm2(&step);
        if scaled {
            unscale_step(&mut step, &self.scaling);
        }
        debug!(
            "dtrs: ‖d‖ = {:.6e}, λ = {:.6e}, {} iterations{}",
            norm,
            inform.multiplier,
            inform.iter,
            if inform.hard_case { ", hard case" } else { "" }
        );

        let result = StepResult {
            step,
            norm,
            multiplier: inform.multiplier,
            hard_case: inform.hard_case,
            iterations: inform.iter,
        };
        self.last_inform = inform;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_interior_solution_has_zero_multiplier() {
        let h = array![2.0, 4.0, 1.0];
        let c = array![1.0, -2.0, 0.5];
        let mut x = Array1::zeros(3);
        let inform = dtrs_solve(10.0, 0.0, &c, &h, &mut x, &DtrsControl::default());

        assert!(inform.status.is_ok());
        assert_eq!(inform.multiplier, 0.0);
        assert!(!inform.hard_case);
        assert_relative_eq!(x[0], -0.5, epsilon = 1e-14);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-14);
        assert_relative_eq!(x[2], -0.5, epsilon = 1e-14);
        assert_relative_eq!(inform.obj, 0.5 * c.dot(&x), epsilon = 1e-14);
    }

    #[test]
    fn test_boundary_solution_lies_on_radius() {
        let h = array![1.0, 3.0];
        let c = array![4.0, -2.0];
        let radius = 0.5;
        let mut x = Array1::zeros(2);
        let inform = dtrs_solve(radius, 0.0, &c, &h, &mut x, &DtrsControl::default());

        assert!(inform.status.is_ok());
        assert!(inform.multiplier > 0.0);
        assert_relative_eq!(norm2(&x), radius, epsilon = 1e-9);
        // stationarity: (h + λ)x = -c
        for i in 0..2 {
            assert_relative_eq!((h[i] + inform.multiplier) * x[i], -c[i], epsilon = 1e-7);
        }
        assert!(!inform.history.is_empty());
    }

    #[test]
    fn test_indefinite_problem() {
        let h = array![-2.0, 1.0, 3.0];
        let c = array![0.5, 1.0, -1.0];
        let radius = 2.0;
        let mut x = Array1::zeros(3);
        let inform = dtrs_solve(radius, 0.0, &c, &h, &mut x, &DtrsControl::default());

        assert!(inform.status.is_ok());
        assert!(inform.multiplier >= 2.0);
        assert_relative_eq!(norm2(&x), radius, epsilon = 1e-9);
    }

    #[test]
    fn test_hard_case_moves_along_null_direction() {
        // the gradient has no component along the negative eigenvalue
        let h = array![-1.0, 2.0];
        let c = array![0.0, 1.0];
        let radius = 1.0;
        let mut x = Array1::zeros(2);
        let inform = dtrs_solve(radius, 0.0, &c, &h, &mut x, &DtrsControl::default());

        assert!(inform.hard_case);
        assert_relative_eq!(inform.multiplier, 1.0, epsilon = 1e-14);
        assert_relative_eq!(norm2(&x), radius, epsilon = 1e-12);
        assert_relative_eq!(x[1], -1.0 / 3.0, epsilon = 1e-14);
    }

    #[test]
    fn test_singular_point_shift_never_vanishes() {
        assert_relative_eq!(shift_past_singularity(2.0, 0.25, 0.5), 3.0);

        // √c2/radius is far below the spacing of doubles near λ
        let lambda = 1e20;
        let shifted = shift_past_singularity(lambda, 1e-20, 1.0);
        assert!(shifted > lambda);
        assert_relative_eq!(shifted, lambda * (1.0 + f64::EPSILON), max_relative = 1e-15);
    }

    #[test]
    fn test_zero_gradient_convex() {
        let h = array![1.0, 2.0];
        let c = array![0.0, 0.0];
        let mut x = Array1::zeros(2);
        let inform = dtrs_solve(1.0, 3.0, &c, &h, &mut x, &DtrsControl::default());
        assert_eq!(x, array![0.0, 0.0]);
        assert_eq!(inform.multiplier, 0.0);
        assert_relative_eq!(inform.obj, 3.0);
    }

    #[test]
    fn test_strategy_interior_step_solves_normal_equations() {
        let j = array![[2.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let f = array![0.1, -0.2, 0.05];
        let hf = Array2::zeros((2, 2));
        let g = -j.t().dot(&f);
        let mut dtrs = Dtrs::new(2);

        let result = dtrs
            .calculate_step(&j, &f, &hf, &g, 100.0, &Options::default())
            .unwrap();
        assert_eq!(result.multiplier, 0.0);

        let a = j.t().dot(&j);
        let residual = a.dot(&result.step) - &g;
        assert!(norm2(&residual) < 1e-12);
    }
}
