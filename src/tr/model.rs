//! Quadratic model of the objective around the current iterate.
//!
//! The model is `m(d) = ½‖f + J·d‖² + ½·dᵗH·d`, where the second term is only
//! present for the Newton and hybrid models.

use ndarray::{Array1, Array2};

use super::config::ModelKind;
use crate::error::Result;
use crate::linalg::{mult_j, norm2};

/// Value of the local model at a trial step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelValue {
    /// Value of the configured model
    pub md: f64,

    /// Value of the Gauss-Newton part alone
    pub md_gn: f64,
}

/// Scratch buffers for [`evaluate_model`].
#[derive(Debug, Clone, Default)]
pub struct ModelWorkspace {
    jd: Array1<f64>,
    hd: Array1<f64>,
}

impl ModelWorkspace {
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            jd: Array1::zeros(m),
            hd: Array1::zeros(n),
        }
    }
}

/// Evaluate the model at step `d`.
///
/// # Arguments
///
/// * `f` - Residuals at the current point
/// * `j` - Jacobian at the current point
/// * `hf` - Second-order term of the Hessian
/// * `d` - The trial step
/// * `model` - Which model to evaluate
/// * `work` - Scratch buffers
pub fn evaluate_model(
    f: &Array1<f64>,
    j: &Array2<f64>,
    hf: &Array2<f64>,
    d: &Array1<f64>,
    model: ModelKind,
    work: &mut ModelWorkspace,
) -> Result<ModelValue> {
    mult_j(j, d, &mut work.jd)?;
    work.jd += f;
    let md_gn = 0.5 * norm2(&work.jd).powi(2);

    let md = match model {
        ModelKind::GaussNewton => md_gn,
        ModelKind::Newton | ModelKind::Hybrid => {
            mult_j(hf, d, &mut work.hd)?;
            md_gn + 0.5 * d.dot(&work.hd)
        }
    };

    Ok(ModelValue { md, md_gn })
}
