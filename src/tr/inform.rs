//! Run diagnostics for the trust-region solver.
//!
//! [`Inform`] is created when a solve starts, updated every iteration, and read
//! by the caller when the solve ends. Its [`Status`] mirrors [`NllsError`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NllsError;

/// Outcome code of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    TooFewObservations,
    UnsupportedModel,
    UnsupportedMethod,
    BadScaling,
    BadTrustRegionStrategy,
    MaxIterationsExceeded,
    MaxTrustRegionReductions,
    NoProgress,
    IllConditioned,
    TooManyShifts,
    NotPositiveDefinite,
    FindBeta,
    DoglegModel,
    AintEigImag,
    FromExternalSolver,
    Evaluation,
    InvalidInput,
}

impl Default for Status {
    fn default() -> Self {
        Status::Ok
    }
}

impl Status {
    /// Returns true if no error has been recorded.
    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }

    /// A short description of the status.
    pub fn message(&self) -> &'static str {
        match self {
            Status::Ok => "Success",
            Status::TooFewObservations => "The problem is overdetermined",
            Status::UnsupportedModel => "Unsupported model passed in options",
            Status::UnsupportedMethod => "Unsupported nlls_method passed in options",
            Status::BadScaling => "Unsupported value of scale passed in options",
            Status::BadTrustRegionStrategy => "Unsupported tr_update_strategy passed in options",
            Status::MaxIterationsExceeded => "Maximum number of iterations reached",
            Status::MaxTrustRegionReductions => {
                "The trust region was reduced the maximum number of times"
            }
            Status::NoProgress => "No progress made",
            Status::IllConditioned => "The trust-region subproblem is ill-conditioned",
            Status::TooManyShifts => "More-Sorensen: too many shifts taken",
            Status::NotPositiveDefinite => "Matrix is not positive definite",
            Status::FindBeta => "Unable to find suitable scalar in find_beta",
            Status::DoglegModel => "Model not supported in dogleg",
            Status::AintEigImag => "All eigenvalues are imaginary (AINT)",
            Status::FromExternalSolver => "External routine gave an error",
            Status::Evaluation => "Error from the user-supplied evaluation",
            Status::InvalidInput => "Invalid input",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<&NllsError> for Status {
    fn from(err: &NllsError) -> Self {
        match err {
            NllsError::TooFewObservations { .. } => Status::TooFewObservations,
            NllsError::UnsupportedModel(_) => Status::UnsupportedModel,
            NllsError::UnsupportedMethod(_) => Status::UnsupportedMethod,
            NllsError::BadScaling(_) => Status::BadScaling,
            NllsError::BadTrustRegionStrategy(_) => Status::BadTrustRegionStrategy,
            NllsError::MaxIterationsExceeded(_) => Status::MaxIterationsExceeded,
            NllsError::MaxTrustRegionReductions(_) => Status::MaxTrustRegionReductions,
            NllsError::NoProgress(_) => Status::NoProgress,
            NllsError::IllConditioned => Status::IllConditioned,
            NllsError::TooManyShifts => Status::TooManyShifts,
            NllsError::NotPositiveDefinite => Status::NotPositiveDefinite,
            NllsError::FindBeta => Status::FindBeta,
            NllsError::DoglegModel => Status::DoglegModel,
            NllsError::AintEigImag => Status::AintEigImag,
            NllsError::FromExternalSolver { .. } => Status::FromExternalSolver,
            NllsError::FunctionEvaluation(_) => Status::Evaluation,
            NllsError::DimensionMismatch(_)
            | NllsError::InvalidInput(_)
            | NllsError::Parameter(_)
            | NllsError::Json(_) => Status::InvalidInput,
        }
    }
}

/// Diagnostics of one solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inform {
    /// Outcome code
    pub status: Status,

    /// Human-readable description of the last error, empty on success
    pub error_message: String,

    /// Name of the external routine that failed, if any
    pub external_name: Option<String>,

    /// Numeric code returned by the failing external routine
    pub external_return: i32,

    /// Outer iterations performed
    pub iter: usize,

    /// Residual evaluations
    pub f_eval: usize,

    /// Jacobian evaluations
    pub g_eval: usize,

    /// Exact Hessian evaluations
    pub h_eval: usize,

    /// Set when `‖f‖` met the convergence test
    pub convergence_normf: bool,

    /// Set when `‖Jᵗf‖/‖f‖` met the convergence test
    pub convergence_normg: bool,

    /// Objective value `½‖f‖²`
    pub obj: f64,

    /// Gradient norm `‖Jᵗf‖`
    pub norm_g: f64,

    /// Residual-scaled gradient norm `‖Jᵗf‖/‖f‖`
    pub scaled_g: f64,

    /// Objective per iteration, when progress vectors are requested
    pub resvec: Vec<f64>,

    /// Gradient norm per iteration, when progress vectors are requested
    pub gradvec: Vec<f64>,

    /// Smallest singular value of J, when requested
    pub smallest_sv: Option<f64>,

    /// Largest singular value of J, when requested
    pub largest_sv: Option<f64>,
}

impl Inform {
    /// Record an error in the status fields.
    pub fn record_error(&mut self, err: &NllsError) {
        self.status = Status::from(err);
        self.error_message = err.to_string();
        if let NllsError::FromExternalSolver { routine, code } = err {
            self.external_name = Some(routine.clone());
            self.external_return = *code;
        }
    }

    /// True once either convergence flag is set.
    pub fn converged(&self) -> bool {
        self.convergence_normf || self.convergence_normg
    }
}
