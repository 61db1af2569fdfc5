use thiserror::Error;

/// Error types for the trnlls-rs library.
///
/// Every failure the solver can report has its own variant. The same taxonomy is
/// mirrored by [`crate::tr::Status`], which is what ends up in the run diagnostics.
#[derive(Error, Debug)]
pub enum NllsError {
    /// The problem has fewer observations than free parameters.
    #[error("The problem is overdetermined: {n} parameters but only {m} observations")]
    TooFewObservations { n: usize, m: usize },

    /// Unsupported model kind passed in the options.
    #[error("Unsupported model passed in options: {0}")]
    UnsupportedModel(String),

    /// Unsupported step-calculation method passed in the options.
    #[error("Unsupported nlls_method passed in options: {0}")]
    UnsupportedMethod(String),

    /// Unsupported scaling policy passed in the options.
    #[error("Unsupported value of scale passed in options: {0}")]
    BadScaling(String),

    /// Unsupported trust-region update strategy passed in the options.
    #[error("Unsupported tr_update_strategy passed in options: {0}")]
    BadTrustRegionStrategy(String),

    /// An iteration limit was exhausted before convergence.
    #[error("Maximum number of iterations reached: {0}")]
    MaxIterationsExceeded(String),

    /// The trust region was shrunk the maximum number of times in one iteration.
    #[error("The trust region was reduced the maximum number of times ({0})")]
    MaxTrustRegionReductions(usize),

    /// The step became too small to change the iterate.
    #[error("No progress made: {0}")]
    NoProgress(String),

    /// The secular-equation multiplier escaped its bracket.
    #[error("The trust-region subproblem is ill-conditioned")]
    IllConditioned,

    /// No positive-definite shift was found within the retry cap.
    #[error("More-Sorensen: too many shifts taken without finding a positive definite matrix")]
    TooManyShifts,

    /// A Cholesky factorization hit a non-positive pivot.
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    /// No scalar beta puts the corrected step on the trust-region boundary.
    #[error("Unable to find a suitable scalar in find_beta")]
    FindBeta,

    /// The dogleg strategy only supports the Gauss-Newton model.
    #[error("Model not supported by the dogleg method (Gauss-Newton only)")]
    DoglegModel,

    /// The AINT eigenproblem had no real rightmost eigenvalue.
    #[error("AINT: all eigenvalues of the pencil are imaginary")]
    AintEigImag,

    /// An external routine returned an error code.
    #[error("External routine {routine} gave error code {code}")]
    FromExternalSolver { routine: String, code: i32 },

    /// Error indicating a mismatch in matrix dimensions.
    #[error("Matrix dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Invalid input data or option values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NllsError {
    /// Returns true for failures caused by the problem set-up or the options,
    /// rather than by the numerical behaviour of a run.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            NllsError::TooFewObservations { .. }
                | NllsError::UnsupportedModel(_)
                | NllsError::UnsupportedMethod(_)
                | NllsError::BadScaling(_)
                | NllsError::BadTrustRegionStrategy(_)
                | NllsError::DoglegModel
                | NllsError::DimensionMismatch(_)
                | NllsError::FunctionEvaluation(_)
                | NllsError::InvalidInput(_)
                | NllsError::Parameter(_)
                | NllsError::Json(_)
        )
    }
}

impl From<crate::parameters::ParameterError> for NllsError {
    fn from(err: crate::parameters::ParameterError) -> Self {
        NllsError::Parameter(format!("{}", err))
    }
}

/// Result type alias for trnlls-rs operations.
pub type Result<T> = std::result::Result<T, NllsError>;
