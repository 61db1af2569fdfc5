//! Configuration options for the trust-region solver.
//!
//! This module defines the options record for one solve: which model is built
//! around the current iterate, which subproblem strategy computes the step, the
//! convergence tolerances, and the trust-region radius and scaling policies.

use serde::{Deserialize, Serialize};

use crate::error::{NllsError, Result};

/// Order of the local model used by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Gauss-Newton: `JᵗJ` only
    GaussNewton,

    /// (Quasi-)Newton: `JᵗJ` plus a second-order correction
    Newton,

    /// Start with Gauss-Newton and switch to Newton when the residual is small
    Hybrid,
}

impl Default for ModelKind {
    fn default() -> Self {
        ModelKind::Hybrid
    }
}

impl TryFrom<i32> for ModelKind {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(ModelKind::GaussNewton),
            2 => Ok(ModelKind::Newton),
            3 => Ok(ModelKind::Hybrid),
            other => Err(NllsError::UnsupportedModel(other.to_string())),
        }
    }
}

/// Method for solving the trust-region subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMethod {
    /// Powell's dogleg
    DogLeg,

    /// Adachi-Iwata-Nakatsukasa-Takeda generalized eigenvalue method
    Aint,

    /// More-Sorensen safeguarded Newton iteration on a shifted Cholesky factor
    MoreSorensen,

    /// Galahad DTRS secular-equation solver in the eigenbasis
    Dtrs,
}

impl Default for StepMethod {
    fn default() -> Self {
        StepMethod::Dtrs
    }
}

impl TryFrom<i32> for StepMethod {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(StepMethod::DogLeg),
            2 => Ok(StepMethod::Aint),
            3 => Ok(StepMethod::MoreSorensen),
            4 => Ok(StepMethod::Dtrs),
            other => Err(NllsError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// How the trust-region radius reacts to the reduction ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrUpdateStrategy {
    /// Piecewise-constant update keyed on the `eta_*` thresholds
    StepFunction,

    /// Nielsen's continuous update
    Continuous,
}

impl Default for TrUpdateStrategy {
    fn default() -> Self {
        TrUpdateStrategy::StepFunction
    }
}

impl TryFrom<i32> for TrUpdateStrategy {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(TrUpdateStrategy::StepFunction),
            2 => Ok(TrUpdateStrategy::Continuous),
            other => Err(NllsError::BadTrustRegionStrategy(other.to_string())),
        }
    }
}

/// Diagonal scaling applied to the subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingPolicy {
    /// No scaling
    None,

    /// Scale by the column norms of the Jacobian
    JacobianNorm,

    /// Scale by the row norms of the Hessian approximation
    HessianDiagonal,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        ScalingPolicy::JacobianNorm
    }
}

impl TryFrom<i32> for ScalingPolicy {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ScalingPolicy::None),
            1 => Ok(ScalingPolicy::JacobianNorm),
            2 => Ok(ScalingPolicy::HessianDiagonal),
            other => Err(NllsError::BadScaling(other.to_string())),
        }
    }
}

/// Configuration options for one trust-region solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of outer iterations. Default: 100
    pub maxit: usize,

    /// Order of the local model. Default: Hybrid
    pub model: ModelKind,

    /// Subproblem strategy. Default: Dtrs
    pub nlls_method: StepMethod,

    /// Absolute convergence tolerance. Default: 1e-5
    pub stop_g_absolute: f64,

    /// Relative convergence tolerance. Default: 1e-8
    pub stop_g_relative: f64,

    /// Derive the initial radius from the Jacobian instead of `initial_radius`. Default: false
    pub relative_tr_radius: bool,

    /// Multiplier for the Jacobian-derived initial radius. Default: 1.0
    pub initial_radius_scale: f64,

    /// Initial trust-region radius. Default: 100.0
    pub initial_radius: f64,

    /// Upper bound on the trust-region radius. Default: 1e8
    pub maximum_radius: f64,

    /// Steps with rho at or below this are rejected. Default: 1e-8
    pub eta_successful: f64,

    /// Below this rho the radius shrinks. Default: 0.25
    pub eta_success_but_reduce: f64,

    /// At or above this rho the radius grows. Default: 0.75
    pub eta_very_successful: f64,

    /// At or above this rho the radius is left alone. Default: 2.0
    pub eta_too_successful: f64,

    /// Radius growth factor. Default: 2.0
    pub radius_increase: f64,

    /// Radius shrink factor. Default: 0.5
    pub radius_reduce: f64,

    /// Most aggressive shrink factor. Default: 0.0625
    pub radius_reduce_max: f64,

    /// Radius update policy. Default: StepFunction
    pub tr_update_strategy: TrUpdateStrategy,

    /// Hybrid switch tolerance, relative to the initial gradient/objective ratio. Default: 2.0
    pub hybrid_tol: f64,

    /// Consecutive small-gradient iterations before switching to second order. Default: 1
    pub hybrid_switch_its: usize,

    /// Ask the problem for exact second derivatives instead of using SR1. Default: false
    pub exact_second_derivatives: bool,

    /// Subproblem scaling policy. Default: JacobianNorm
    pub scale: ScalingPolicy,

    /// Upper clamp for squared scale entries. Default: 1e11
    pub scale_max: f64,

    /// Lower clamp for squared scale entries. Default: 1e-11
    pub scale_min: f64,

    /// Clamp small entries to `scale_min` (otherwise reset to 1). Default: true
    pub scale_trim_min: bool,

    /// Clamp large entries to `scale_max` (otherwise reset to 1). Default: true
    pub scale_trim_max: bool,

    /// Never let a scale entry decrease between iterations. Default: false
    pub scale_require_increase: bool,

    /// Iteration limit of the More-Sorensen Newton loop. Default: 500
    pub more_sorensen_maxits: usize,

    /// Seed for the positive-definite shift. Default: 1e-13
    pub more_sorensen_shift: f64,

    /// Negligible-value threshold in More-Sorensen. Default: 10 * machine epsilon
    pub more_sorensen_tiny: f64,

    /// Relative boundary tolerance in More-Sorensen. Default: 1e-3
    pub more_sorensen_tol: f64,

    /// Trust-region reductions allowed within one iteration. Default: 100
    pub max_tr_decrease: usize,

    /// Record the extreme singular values of J. Default: false
    pub calculate_svd_j: bool,

    /// Record objective and gradient norm per iteration. Default: false
    pub output_progress_vectors: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            maxit: 100,
            model: ModelKind::default(),
            nlls_method: StepMethod::default(),
            stop_g_absolute: 1e-5,
            stop_g_relative: 1e-8,
            relative_tr_radius: false,
            initial_radius_scale: 1.0,
            initial_radius: 100.0,
            maximum_radius: 1e8,
            eta_successful: 1e-8,
            eta_success_but_reduce: 0.25,
            eta_very_successful: 0.75,
            eta_too_successful: 2.0,
            radius_increase: 2.0,
            radius_reduce: 0.5,
            radius_reduce_max: 0.0625,
            tr_update_strategy: TrUpdateStrategy::default(),
            hybrid_tol: 2.0,
            hybrid_switch_its: 1,
            exact_second_derivatives: false,
            scale: ScalingPolicy::default(),
            scale_max: 1e11,
            scale_min: 1e-11,
            scale_trim_min: true,
            scale_trim_max: true,
            scale_require_increase: false,
            more_sorensen_maxits: 500,
            more_sorensen_shift: 1e-13,
            more_sorensen_tiny: 10.0 * f64::EPSILON,
            more_sorensen_tol: 1e-3,
            max_tr_decrease: 100,
            calculate_svd_j: false,
            output_progress_vectors: false,
        }
    }
}

impl Options {
    /// Load options from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Options = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serialize the options to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the numeric options are usable.
    pub fn validate(&self) -> Result<()> {
        if self.maxit == 0 {
            return Err(NllsError::InvalidInput("maxit must be positive".to_string()));
        }
        if !(self.initial_radius > 0.0) || !(self.maximum_radius > 0.0) {
            return Err(NllsError::InvalidInput(format!(
                "trust-region radii must be positive (initial {}, maximum {})",
                self.initial_radius, self.maximum_radius
            )));
        }
        if self.relative_tr_radius && !(self.initial_radius_scale > 0.0) {
            return Err(NllsError::InvalidInput(
                "initial_radius_scale must be positive".to_string(),
            ));
        }
        if !(self.eta_successful <= self.eta_success_but_reduce
            && self.eta_success_but_reduce <= self.eta_very_successful
            && self.eta_very_successful <= self.eta_too_successful)
        {
            return Err(NllsError::InvalidInput(
                "eta thresholds must be non-decreasing".to_string(),
            ));
        }
        if !(self.radius_reduce > 0.0 && self.radius_reduce < 1.0) || !(self.radius_increase > 1.0)
        {
            return Err(NllsError::InvalidInput(format!(
                "radius factors out of range (reduce {}, increase {})",
                self.radius_reduce, self.radius_increase
            )));
        }
        if self.scale_min > self.scale_max {
            return Err(NllsError::InvalidInput(
                "scale_min must not exceed scale_max".to_string(),
            ));
        }
        if self.more_sorensen_maxits == 0 || self.max_tr_decrease == 0 {
            return Err(NllsError::InvalidInput(
                "iteration caps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
