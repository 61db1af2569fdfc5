//! Parameter definition and implementation
//!
//! This module provides the Parameter struct, the unit of the parameter
//! system: a named value that is either varied during optimization or fixed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("Expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// A named parameter for a fitting problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    pub name: String,

    /// Current value of the parameter
    value: f64,

    /// Whether this parameter can be varied during optimization
    pub vary: bool,
}

impl Parameter {
    /// Create a varying parameter with the given name and value.
    ///
    /// # Examples
    ///
    /// ```
    /// use trnlls_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new("amplitude", 10.0);
    /// assert_eq!(param.name(), "amplitude");
    /// assert_eq!(param.value(), 10.0);
    /// assert!(param.vary());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            vary: true,
        }
    }

    /// Create a parameter that is held at `value` during optimization.
    pub fn fixed(name: &str, value: f64) -> Self {
        Self {
            vary: false,
            ..Self::new(name, value)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter.
    ///
    /// Fails for NaN or infinite values, which the solver cannot start from.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NonFiniteValue {
                name: self.name.clone(),
                value,
            });
        }
        self.value = value;
        Ok(())
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    /// Set whether the parameter is varied during optimization
    pub fn set_vary(&mut self, vary: bool) {
        self.vary = vary;
    }
}
