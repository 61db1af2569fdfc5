//! # Parameter System
//!
//! Named fit parameters in a fixed order. Each parameter is either varied by
//! the solver or held fixed at its value; the active-parameter index map
//! translates between the solver's vector of free values and the full set.
//!
//! ## Example Usage
//!
//! ```rust
//! use trnlls_rs::parameters::Parameters;
//!
//! let mut params = Parameters::new();
//! params.add_param("a", 1.0).unwrap();
//! params.add_param("b", 2.0).unwrap();
//!
//! // Fix a parameter (won't be varied during optimization)
//! params.get_mut("a").unwrap().set_vary(false);
//!
//! assert_eq!(params.varying_indices(), vec![1]);
//! assert_eq!(params.varying_values().to_vec(), vec![2.0]);
//! ```

pub mod parameter;
pub mod parameters;

// Re-export key types
pub use parameter::{Parameter, ParameterError};
pub use parameters::Parameters;
