//! Diagonal scaling of the trust-region subproblem.
//!
//! The subproblem `min vᵗd + ½dᵗA·d, ‖d‖ ≤ Δ` is posed in the variables `D·d`,
//! where `D` is a diagonal matrix built from either the Jacobian or `A`. The
//! strategies solve in scaled variables and divide the step by `D` afterwards.

use ndarray::{Array1, Array2};

use super::config::{Options, ScalingPolicy};
use crate::error::{NllsError, Result};

/// Scale vector kept between calls so that `scale_require_increase` can see
/// the previous iteration.
#[derive(Debug, Clone, Default)]
pub struct ScalingWorkspace {
    pub diag: Array1<f64>,
}

impl ScalingWorkspace {
    pub fn new(n: usize) -> Self {
        Self {
            diag: Array1::ones(n),
        }
    }
}

/// Compute the scale vector and apply it to `a` and `v` in place.
///
/// `a` becomes `D⁻¹·A·D⁻¹` and `v` becomes `D⁻¹·v`. Returns `BadScaling`
/// without touching anything when the policy is [`ScalingPolicy::None`].
pub fn apply_scaling(
    j: &Array2<f64>,
    a: &mut Array2<f64>,
    v: &mut Array1<f64>,
    w: &mut ScalingWorkspace,
    options: &Options,
) -> Result<()> {
    let n = j.ncols();
    if w.diag.len() != n {
        w.diag = Array1::ones(n);
    }

    let squared_norms: Vec<f64> = match options.scale {
        ScalingPolicy::JacobianNorm => (0..n)
            .map(|i| j.column(i).iter().map(|x| x * x).sum())
            .collect(),
        ScalingPolicy::HessianDiagonal => (0..n)
            .map(|i| a.row(i).iter().map(|x| x * x).sum())
            .collect(),
        ScalingPolicy::None => {
            return Err(NllsError::BadScaling(
                "scaling requested with policy None".to_string(),
            ))
        }
    };

    for i in 0..n {
        let mut temp = squared_norms[i];
        if temp < options.scale_min {
            temp = if options.scale_trim_min {
                options.scale_min
            } else {
                1.0
            };
        } else if temp > options.scale_max {
            temp = if options.scale_trim_max {
                options.scale_max
            } else {
                1.0
            };
        }
        temp = temp.sqrt();

        w.diag[i] = if options.scale_require_increase {
            temp.max(w.diag[i])
        } else {
            temp
        };
    }

    for i in 0..n {
        let scale = w.diag[i];
        v[i] /= scale;
        for jj in 0..n {
            a[[i, jj]] /= scale;
            a[[jj, i]] /= scale;
        }
    }

    Ok(())
}

/// Map a step from scaled back to original variables.
pub fn unscale_step(d: &mut Array1<f64>, w: &ScalingWorkspace) {
    d.zip_mut_with(&w.diag, |di, &s| *di /= s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_jacobian_norm_scaling() {
        let j = array![[3.0, 0.0], [4.0, 2.0]];
        let mut a = array![[25.0, 8.0], [8.0, 4.0]];
        let mut v = array![5.0, 2.0];
        let mut w = ScalingWorkspace::new(2);

        apply_scaling(&j, &mut a, &mut v, &mut w, &Options::default()).unwrap();
        assert_relative_eq!(w.diag[0], 5.0);
        assert_relative_eq!(w.diag[1], 2.0);
        assert_relative_eq!(v[0], 1.0);
        assert_relative_eq!(v[1], 1.0);
        assert_relative_eq!(a[[0, 0]], 1.0);
        assert_relative_eq!(a[[0, 1]], 0.8);
        assert_relative_eq!(a[[1, 0]], 0.8);
        assert_relative_eq!(a[[1, 1]], 1.0);

        let mut d = array![1.0, 1.0];
        unscale_step(&mut d, &w);
        assert_relative_eq!(d[0], 0.2);
        assert_relative_eq!(d[1], 0.5);
    }

    #[test]
    fn test_trim_and_require_increase() {
        let j = array![[0.0, 1e-3], [0.0, 0.0]];
        let mut a = Array2::eye(2);
        let mut v = array![1.0, 1.0];
        let mut w = ScalingWorkspace::new(2);
        w.diag[1] = 7.0;

        let options = Options {
            scale_trim_min: false,
            scale_require_increase: true,
            ..Options::default()
        };
        apply_scaling(&j, &mut a, &mut v, &mut w, &options).unwrap();
        // zero column is reset to 1, second entry keeps the larger previous value
        assert_relative_eq!(w.diag[0], 1.0);
        assert_relative_eq!(w.diag[1], 7.0);
    }

    #[test]
    fn test_none_policy_leaves_inputs_alone() {
        let j = array![[2.0, 0.0], [0.0, 2.0]];
        let mut a = array![[4.0, 0.0], [0.0, 4.0]];
        let mut v = array![1.0, 1.0];
        let mut w = ScalingWorkspace::new(2);
        let options = Options {
            scale: ScalingPolicy::None,
            ..Options::default()
        };

        let err = apply_scaling(&j, &mut a, &mut v, &mut w, &options).unwrap_err();
        assert!(matches!(err, NllsError::BadScaling(_)));
        assert_eq!(a, array![[4.0, 0.0], [0.0, 4.0]]);
        assert_eq!(v, array![1.0, 1.0]);
    }
}
