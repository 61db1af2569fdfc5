//! Convergence criteria for the trust-region solver.
//!
//! Two tests are applied after every accepted step: one on the residual norm
//! `‖f‖` and one on the residual-scaled gradient `‖Jᵗf‖/‖f‖`. Each compares
//! against the larger of an absolute tolerance and a tolerance relative to
//! the value at the starting point.

use super::config::Options;
use super::inform::Inform;

/// Possible convergence states after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// The solver should keep iterating.
    Running,

    /// The residual norm is small.
    ResidualConvergence,

    /// The residual-scaled gradient is small.
    GradientConvergence,
}

impl ConvergenceStatus {
    /// Returns true if the solver has converged.
    pub fn is_converged(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> String {
        match self {
            ConvergenceStatus::Running => "Optimization is still running".to_string(),
            ConvergenceStatus::ResidualConvergence => "Converged: small residual norm".to_string(),
            ConvergenceStatus::GradientConvergence => {
                "Converged: small residual-scaled gradient".to_string()
            }
        }
    }
}

/// Tolerances for the convergence tests.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceCriteria {
    /// Absolute tolerance.
    pub stop_g_absolute: f64,

    /// Tolerance relative to the starting values.
    pub stop_g_relative: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}

impl ConvergenceCriteria {
    /// Take the tolerances from a set of options.
    pub fn from_options(options: &Options) -> Self {
        Self {
            stop_g_absolute: options.stop_g_absolute,
            stop_g_relative: options.stop_g_relative,
        }
    }

    /// Run both tests.
    ///
    /// # Arguments
    ///
    /// * `normf` - Current residual norm
    /// * `normjf` - Current gradient norm `‖Jᵗf‖`
    /// * `normf0` - Residual norm at the starting point
    /// * `normjf0` - Gradient norm at the starting point
    pub fn check(&self, normf: f64, normjf: f64, normf0: f64, normjf0: f64) -> ConvergenceStatus {
        if normf <= self.stop_g_absolute.max(self.stop_g_relative * normf0) {
            return ConvergenceStatus::ResidualConvergence;
        }

        if normjf / normf <= self.stop_g_absolute.max(self.stop_g_relative * (normjf0 / normf0)) {
            return ConvergenceStatus::GradientConvergence;
        }

        ConvergenceStatus::Running
    }
}

/// Run the convergence tests and record the result in `inform`.
pub fn test_convergence(
    normf: f64,
    normjf: f64,
    normf0: f64,
    normjf0: f64,
    options: &Options,
    inform: &mut Inform,
) -> ConvergenceStatus {
    let status = ConvergenceCriteria::from_options(options).check(normf, normjf, normf0, normjf0);
    match status {
        ConvergenceStatus::ResidualConvergence => inform.convergence_normf = true,
        ConvergenceStatus::GradientConvergence => inform.convergence_normg = true,
        ConvergenceStatus::Running => {}
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_criteria() {
        let criteria = ConvergenceCriteria::default();

        // Residual norm below the absolute tolerance
        let status = criteria.check(1e-6, 1.0, 10.0, 10.0);
        assert_eq!(status, ConvergenceStatus::ResidualConvergence);

        // Zero residual does not reach the gradient test
        let status = criteria.check(0.0, 0.0, 10.0, 10.0);
        assert_eq!(status, ConvergenceStatus::ResidualConvergence);

        // Gradient small relative to the residual
        let status = criteria.check(1.0, 1e-6, 10.0, 10.0);
        assert_eq!(status, ConvergenceStatus::GradientConvergence);

        let status = criteria.check(1.0, 0.5, 10.0, 10.0);
        assert_eq!(status, ConvergenceStatus::Running);
    }

    #[test]
    fn test_relative_tolerance_scales_with_start() {
        let criteria = ConvergenceCriteria {
            stop_g_absolute: 0.0,
            stop_g_relative: 1e-3,
        };
        assert_eq!(
            criteria.check(0.5, 1.0, 1000.0, 1.0),
            ConvergenceStatus::ResidualConvergence
        );
        assert_eq!(criteria.check(2.0, 1.0, 1000.0, 1.0), ConvergenceStatus::Running);
    }

    #[test]
    fn test_flags_recorded() {
        let mut inform = Inform::default();
        let status = test_convergence(1.0, 1e-9, 10.0, 10.0, &Options::default(), &mut inform);
        assert!(status.is_converged());
        assert!(inform.convergence_normg);
        assert!(!inform.convergence_normf);
        assert!(inform.converged());
    }
}
