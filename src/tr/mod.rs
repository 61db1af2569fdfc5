//! Trust-region algorithm for nonlinear least squares.
//!
//! The solver minimizes `½‖f(x)‖²` by repeatedly building a local model of the
//! objective (Gauss-Newton, Newton, or a hybrid of the two), solving the
//! trust-region subproblem with one of four strategies, and adjusting the
//! radius according to how well the model predicted the actual reduction.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod hessian;
pub mod inform;
pub mod model;
pub mod scaling;
pub mod step;
pub mod trust_region;
pub mod workspace;

// Re-export key types
pub use algorithm::{TrResult, TrustRegionSolver};
pub use config::{ModelKind, Options, ScalingPolicy, StepMethod, TrUpdateStrategy};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use inform::{Inform, Status};
pub use step::{StepResult, StepSolver, StepStrategy};
pub use trust_region::TrustRegion;
pub use workspace::{SolverState, Workspace};
