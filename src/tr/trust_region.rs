//! Trust-region radius management.
//!
//! This module computes the ratio of actual to predicted reduction for a trial
//! step and adapts the radius from it, with either a step-function or Nielsen's
//! continuous update.

use super::config::{Options, TrUpdateStrategy};

/// Reductions smaller than this are treated as perfect agreement.
const REDUCTION_FLOOR: f64 = 10.0 * f64::EPSILON;

/// Exponent of Nielsen's continuous update.
const NIELSEN_EXPONENT: i32 = 3;

/// Trust-region radius and the state of its update policy.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustRegion {
    /// Current radius
    pub delta: f64,

    /// Decay factor applied on successive failures (continuous update only)
    pub tr_nu: f64,

    /// Exponent of the continuous update
    pub tr_p: i32,
}

impl TrustRegion {
    /// Creates a trust region with the given radius.
    pub fn new(delta: f64, options: &Options) -> Self {
        Self {
            delta,
            tr_nu: options.radius_reduce,
            tr_p: NIELSEN_EXPONENT,
        }
    }

    /// Calculates the ratio of actual to predicted reduction.
    ///
    /// # Arguments
    ///
    /// * `normf` - Residual norm at the current point
    /// * `normfnew` - Residual norm at the trial point
    /// * `md` - Model value at the trial step
    pub fn calculate_rho(normf: f64, normfnew: f64, md: f64) -> f64 {
        let actual_reduction = (0.5 * normf.powi(2)) - (0.5 * normfnew.powi(2));
        let predicted_reduction = (0.5 * normf.powi(2)) - md;

        if actual_reduction.abs() < REDUCTION_FLOOR || predicted_reduction.abs() < REDUCTION_FLOOR
        {
            1.0
        } else {
            actual_reduction / predicted_reduction
        }
    }

    /// Updates the radius from the reduction ratio of the last trial step.
    ///
    /// # Arguments
    ///
    /// * `rho` - The reduction ratio
    /// * `normd` - Length of the trial step, in the scaled norm used by the strategy
    /// * `options` - Thresholds and factors
    pub fn update_radius(&mut self, rho: f64, normd: f64, options: &Options) {
        let shrink = options.radius_reduce.max(options.radius_reduce_max);

        match options.tr_update_strategy {
            TrUpdateStrategy::StepFunction => {
                if !rho.is_finite() || rho < options.eta_success_but_reduce {
                    self.delta *= shrink;
                } else if rho < options.eta_very_successful {
                    // doing ok, retain status quo
                } else if rho < options.eta_too_successful {
                    self.delta = options.maximum_radius.min(options.radius_increase * normd);
                }
                // too successful: accept the step but leave the radius alone
            }
            TrUpdateStrategy::Continuous => {
                if !rho.is_finite() {
                    self.delta *= shrink;
                } else if rho >= options.eta_too_successful {
                    // leave the radius alone
                } else if rho > options.eta_successful {
                    let factor = 1.0
                        - (options.radius_increase - 1.0) * (1.0 - 2.0 * rho).powi(self.tr_p);
                    self.delta *= options
                        .radius_increase
                        .min(options.radius_reduce.max(factor));
                    self.tr_nu = options.radius_reduce;
                } else {
                    self.delta *= self.tr_nu;
                    self.tr_nu *= 0.5;
                }
            }
        }

        self.delta = self.delta.clamp(0.0, options.maximum_radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rho_treats_tiny_reductions_as_agreement() {
        assert_eq!(TrustRegion::calculate_rho(1.0, 1.0, 0.3), 1.0);
        assert_eq!(TrustRegion::calculate_rho(2.0, 1.0, 2.0), 1.0);

        // actual 1.5, predicted 2.0 - 0.5 = 1.5
        assert_relative_eq!(TrustRegion::calculate_rho(2.0, 1.0, 0.5), 1.0);
        // actual 1.5, predicted 2.0 - 1.25 = 0.75
        assert_relative_eq!(TrustRegion::calculate_rho(2.0, 1.0, 1.25), 2.0);
    }

    #[test]
    fn test_step_function_sequence() {
        let options = Options::default();
        let mut tr = TrustRegion::new(1.0, &options);

        tr.update_radius(0.99, 0.8, &options);
        let after_good = tr.delta;
        assert_relative_eq!(after_good, 1.6);

        tr.update_radius(0.5, 0.8, &options);
        assert_eq!(tr.delta, after_good);

        tr.update_radius(1e-10, 0.8, &options);
        assert_relative_eq!(tr.delta, after_good * 0.5);

        tr.update_radius(f64::NAN, 0.8, &options);
        assert_relative_eq!(tr.delta, after_good * 0.25);
    }

    #[test]
    fn test_step_function_too_successful_keeps_radius() {
        let options = Options::default();
        let mut tr = TrustRegion::new(3.0, &options);
        tr.update_radius(5.0, 1.0, &options);
        assert_eq!(tr.delta, 3.0);
    }

    #[test]
    fn test_growth_capped_by_maximum_radius() {
        let options = Options {
            maximum_radius: 1.5,
            ..Options::default()
        };
        let mut tr = TrustRegion::new(1.0, &options);
        tr.update_radius(0.9, 10.0, &options);
        assert_eq!(tr.delta, 1.5);
    }

    #[test]
    fn test_continuous_update() {
        let options = Options {
            tr_update_strategy: TrUpdateStrategy::Continuous,
            ..Options::default()
        };
        let mut tr = TrustRegion::new(1.0, &options);

        // rho = 1: factor = 1 - (2 - 1) * (-1)^3 = 2
        tr.update_radius(1.0, 1.0, &options);
        assert_relative_eq!(tr.delta, 2.0);

        // successive failures shrink increasingly fast
        tr.update_radius(0.0, 1.0, &options);
        assert_relative_eq!(tr.delta, 1.0);
        tr.update_radius(-1.0, 1.0, &options);
        assert_relative_eq!(tr.delta, 0.25);
        assert_relative_eq!(tr.tr_nu, 0.125);

        // a success resets the decay
        tr.update_radius(0.5, 1.0, &options);
        assert_relative_eq!(tr.delta, 0.25);
        assert_relative_eq!(tr.tr_nu, options.radius_reduce);
    }
}
