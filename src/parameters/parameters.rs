//! Parameters collection implementation
//!
//! This module provides the Parameters struct, an ordered collection of
//! Parameter objects. The order fixes the layout of the full parameter vector;
//! the varying parameters, in the same order, form the vector the solver sees.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::parameters::parameter::{Parameter, ParameterError};

/// An ordered collection of parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    params: Vec<Parameter>,
}

impl Parameters {
    /// Create a new empty parameters collection
    ///
    /// # Examples
    ///
    /// ```
    /// use trnlls_rs::parameters::Parameters;
    ///
    /// let params = Parameters::new();
    /// assert_eq!(params.len(), 0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter to the collection.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the parameter was added, or an error if a parameter with the
    /// same name already exists
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.contains(param.name()) {
            return Err(ParameterError::DuplicateName {
                name: param.name().to_string(),
            });
        }
        self.params.push(param);
        Ok(())
    }

    /// Append a varying parameter with the given name and value.
    pub fn add_param(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.add(Parameter::new(name, value))
    }

    /// Append a fixed parameter with the given name and value.
    pub fn add_fixed(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.add(Parameter::fixed(name, value))
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over the parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Names of all parameters, in order.
    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    /// Values of all parameters, fixed ones included.
    pub fn values(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.value()).collect()
    }

    /// Positions of the varying parameters in the full parameter vector.
    pub fn varying_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.vary())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of varying parameters.
    pub fn varying_count(&self) -> usize {
        self.params.iter().filter(|p| p.vary()).count()
    }

    /// Values of the varying parameters, in order.
    pub fn varying_values(&self) -> Array1<f64> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(|p| p.value())
            .collect()
    }

    /// Full parameter vector with the varying entries taken from `active`.
    pub fn expand(&self, active: &Array1<f64>) -> Result<Array1<f64>, ParameterError> {
        let indices = self.varying_indices();
        if active.len() != indices.len() {
            return Err(ParameterError::LengthMismatch {
                expected: indices.len(),
                actual: active.len(),
            });
        }
        let mut full = self.values();
        for (&i, &v) in indices.iter().zip(active.iter()) {
            full[i] = v;
        }
        Ok(full)
    }

    /// Write new values into the varying parameters, in order.
    ///
    /// Nothing is changed if any value is rejected.
    pub fn update_varying(&mut self, active: &Array1<f64>) -> Result<(), ParameterError> {
        let expected = self.varying_count();
        if active.len() != expected {
            return Err(ParameterError::LengthMismatch {
                expected,
                actual: active.len(),
            });
        }

        let mut updated = self.params.clone();
        for (param, &value) in updated.iter_mut().filter(|p| p.vary()).zip(active.iter()) {
            param.set_value(value)?;
        }
        self.params = updated;
        Ok(())
    }

    /// Serialize the collection to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a collection from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
