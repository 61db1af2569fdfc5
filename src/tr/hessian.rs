//! Quasi-Newton approximation of the second-order Hessian term.
//!
//! When the problem cannot supply `Σ fᵢ∇²fᵢ`, the solver keeps a dense
//! approximation and refreshes it after every accepted step with a damped
//! symmetric rank-one update.

use ndarray::{Array1, Array2};

/// Updates with `|dᵗy|` below this are skipped.
fn skip_threshold() -> f64 {
    (10.0 * f64::EPSILON).sqrt()
}

/// Outer product `x·yᵗ`.
fn outer(x: &Array1<f64>, y: &Array1<f64>) -> Array2<f64> {
    let x_col = x.view().insert_axis(ndarray::Axis(1));
    let y_row = y.view().insert_axis(ndarray::Axis(0));
    x_col.dot(&y_row)
}

/// Apply the damped SR1 update to `hf`.
///
/// # Arguments
///
/// * `d` - The accepted step
/// * `y` - Difference of gradients at the old and new points
/// * `y_sharp` - Difference of the mixed gradient (new residuals, old Jacobian)
///   and the new gradient
/// * `hf` - The approximation, updated in place
///
/// # Returns
///
/// `true` when the update was applied, `false` when it was skipped.
pub fn rank_one_update(
    d: &Array1<f64>,
    y: &Array1<f64>,
    y_sharp: &Array1<f64>,
    hf: &mut Array2<f64>,
) -> bool {
    let yts = d.dot(y);
    if yts.abs() < skip_threshold() {
        return false;
    }

    let sks = hf.dot(d);
    let ysharp_sks = y_sharp - &sks;

    // Dennis-Schnabel damping
    let alpha = (d.dot(y_sharp).abs() / d.dot(&sks).abs()).min(1.0);
    *hf *= alpha;

    let scale = ysharp_sks.dot(d) / yts.powi(2);
    *hf += &(outer(&ysharp_sks, y) / yts);
    *hf += &(outer(y, &ysharp_sks) / yts);
    *hf -= &(outer(y, y) * scale);

    true
}
