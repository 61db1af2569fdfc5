//! # trnlls-rs
//!
//! `trnlls-rs` is a trust-region solver for nonlinear least-squares problems,
//! minimizing `½‖f(x)‖²` for a residual vector `f`.
//!
//! The library provides:
//! - A trust-region driver with Gauss-Newton, Newton and hybrid local models
//! - Four subproblem strategies: dogleg, AINT, More-Sorensen and DTRS
//! - A symmetric rank-one quasi-Newton approximation of the second-order term
//! - Named parameters and a curve-fitting adapter with fixed parameters and weights
//!
//! ## Basic Usage
//!
//! ```
//! use ndarray::Array1;
//! use trnlls_rs::fitting::{CurveFit, FitFunction, LinearFunction};
//! use trnlls_rs::tr::TrustRegionSolver;
//!
//! let x = Array1::linspace(0.0, 10.0, 20);
//! let y = x.mapv(|v| 1.1 * v + 2.2);
//! let params = LinearFunction.parameters(&[1.0, 2.0]).unwrap();
//!
//! let mut fit = CurveFit::new(LinearFunction, x, y, params).unwrap();
//! let result = fit.fit(&TrustRegionSolver::new()).unwrap();
//! assert!(result.success);
//! ```

// Public modules
pub mod error;
pub mod linalg;

// Parameter system
pub mod parameters;

pub mod fitting;
pub mod problem;
pub mod tr;

mod utils;

// Re-exports for convenience
pub use error::{NllsError, Result};
pub use fitting::{CurveFit, FitFunction};
pub use problem::Problem;
pub use tr::{Inform, Options, Status, TrResult, TrustRegionSolver};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
