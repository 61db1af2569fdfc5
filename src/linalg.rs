//! Dense linear-algebra primitives used by the trust-region solver.
//!
//! All routines write into caller-supplied buffers so that the solver workspace
//! can be reused across iterations. A buffer whose shape does not match the
//! result is reallocated. A failed Cholesky factorization is reported as
//! [`NllsError::NotPositiveDefinite`]; the More-Sorensen strategy relies on that
//! signal to detect indefiniteness.

use crate::error::{NllsError, Result};
use crate::utils::matrix_convert::{
    nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};
use nalgebra::linalg::{Cholesky, SymmetricEigen, SVD};
use nalgebra::Dyn;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};

/// Resize a vector buffer to length `n` if needed.
pub(crate) fn ensure_len(v: &mut Array1<f64>, n: usize) {
    if v.len() != n {
        *v = Array1::zeros(n);
    }
}

/// Resize a matrix buffer to `rows x cols` if needed.
pub(crate) fn ensure_dim(a: &mut Array2<f64>, rows: usize, cols: usize) {
    if a.dim() != (rows, cols) {
        *a = Array2::zeros((rows, cols));
    }
}

/// Compute `A = JᵗJ` for an m×n matrix `J`.
pub fn matmult_inner(j: &Array2<f64>, a: &mut Array2<f64>) {
    let n = j.ncols();
    ensure_dim(a, n, n);
    for col_i in 0..n {
        for col_k in col_i..n {
            let value = j.column(col_i).dot(&j.column(col_k));
            a[[col_i, col_k]] = value;
            a[[col_k, col_i]] = value;
        }
    }
}

/// Compute `y = J·x`.
pub fn mult_j(j: &Array2<f64>, x: &Array1<f64>, y: &mut Array1<f64>) -> Result<()> {
    if j.ncols() != x.len() {
        return Err(NllsError::DimensionMismatch(format!(
            "cannot multiply a {}x{} matrix by a vector of length {}",
            j.nrows(),
            j.ncols(),
            x.len()
        )));
    }
    ensure_len(y, j.nrows());
    y.assign(&j.dot(x));
    Ok(())
}

/// Compute `y = Jᵗ·x`.
pub fn mult_jt(j: &Array2<f64>, x: &Array1<f64>, y: &mut Array1<f64>) -> Result<()> {
    if j.nrows() != x.len() {
        return Err(NllsError::DimensionMismatch(format!(
            "cannot multiply the transpose of a {}x{} matrix by a vector of length {}",
            j.nrows(),
            j.ncols(),
            x.len()
        )));
    }
    ensure_len(y, j.ncols());
    y.assign(&j.t().dot(x));
    Ok(())
}

/// Euclidean norm. Returns 0 for an empty vector.
pub fn norm2<S>(v: &ArrayBase<S, Ix1>) -> f64
where
    S: Data<Elem = f64>,
{
    if v.is_empty() {
        return 0.0;
    }
    v.dot(v).sqrt()
}

/// Inner product of two equal-length vectors.
pub fn dot(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    x.dot(y)
}

/// Index of the smallest entry, taking the first one on ties.
pub fn index_of_min(v: &Array1<f64>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &value) in v.iter().enumerate() {
        match best {
            Some(b) if v[b] <= value => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Full eigendecomposition of a symmetric matrix.
///
/// The eigenvalues are returned in whatever order the decomposition produces
/// them; callers that need the extremes must scan for them.
pub fn all_eig_symm(a: &Array2<f64>, ew: &mut Array1<f64>, ev: &mut Array2<f64>) -> Result<()> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(NllsError::DimensionMismatch(format!(
            "eigendecomposition needs a square matrix, got {}x{}",
            n,
            a.ncols()
        )));
    }
    let eigen = SymmetricEigen::new(ndarray_to_nalgebra(a));
    *ew = nalgebra_vec_to_ndarray(&eigen.eigenvalues);
    *ev = nalgebra_to_ndarray(&eigen.eigenvectors);
    Ok(())
}

/// Leftmost eigenvalue of a symmetric matrix and its eigenvector.
pub fn min_eig_symm(a: &Array2<f64>) -> Result<(f64, Array1<f64>)> {
    let mut ew = Array1::zeros(0);
    let mut ev = Array2::zeros((0, 0));
    all_eig_symm(a, &mut ew, &mut ev)?;
    let imin = index_of_min(&ew)
        .ok_or_else(|| NllsError::InvalidInput("empty matrix has no eigenvalues".to_string()))?;
    Ok((ew[imin], ev.column(imin).to_owned()))
}

/// Cholesky factor of a symmetric positive-definite matrix.
pub type CholeskyFactor = Cholesky<f64, Dyn>;

/// Cholesky factorization `A = L·Lᵗ`.
///
/// Fails with [`NllsError::NotPositiveDefinite`] when `A` is not positive
/// definite. Only the lower triangle of `A` is read.
pub fn cholesky(a: &Array2<f64>) -> Result<CholeskyFactor> {
    if a.nrows() != a.ncols() {
        return Err(NllsError::DimensionMismatch(format!(
            "Cholesky factorization needs a square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    let factor = Cholesky::new(ndarray_to_nalgebra(a)).ok_or(NllsError::NotPositiveDefinite)?;
    // zero and NaN pivots count as failures too
    if factor.l_dirty().diagonal().iter().any(|&p| !(p > 0.0 && p.is_finite())) {
        return Err(NllsError::NotPositiveDefinite);
    }
    Ok(factor)
}

/// Solve `A·x = b` for symmetric positive-definite `A`.
///
/// Returns the Cholesky factor for later use (the More-Sorensen Newton update
/// needs it). Fails with [`NllsError::NotPositiveDefinite`] when `A` is not
/// positive definite.
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>, x: &mut Array1<f64>) -> Result<CholeskyFactor> {
    if a.nrows() != b.len() || a.ncols() != b.len() {
        return Err(NllsError::DimensionMismatch(format!(
            "cannot solve a {}x{} system with a right-hand side of length {}",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }
    let factor = cholesky(a)?;
    *x = nalgebra_vec_to_ndarray(&factor.solve(&ndarray_vec_to_nalgebra(b)));
    Ok(factor)
}

/// Solve `L·q = b` with the lower-triangular factor of `factor`.
pub fn solve_with_lower_factor(factor: &CholeskyFactor, b: &Array1<f64>) -> Result<Array1<f64>> {
    let q = factor
        .l_dirty()
        .solve_lower_triangular(&ndarray_vec_to_nalgebra(b))
        .ok_or(NllsError::NotPositiveDefinite)?;
    Ok(nalgebra_vec_to_ndarray(&q))
}

/// Compute `A + σI`.
pub fn shift_matrix(a: &Array2<f64>, sigma: f64, a_plus_sigma: &mut Array2<f64>) {
    let n = a.nrows();
    ensure_dim(a_plus_sigma, n, a.ncols());
    a_plus_sigma.assign(a);
    for i in 0..n {
        a_plus_sigma[[i, i]] += sigma;
    }
}

/// Smallest and largest singular values of `J`.
pub fn svd_extremes(j: &Array2<f64>) -> (f64, f64) {
    if j.is_empty() {
        return (0.0, 0.0);
    }
    let svd = SVD::new(ndarray_to_nalgebra(j), false, false);
    let values = &svd.singular_values;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(0.0, f64::max);
    (min, max)
}

/// Solve the linear least-squares problem `min ‖J·d + f‖`.
pub fn solve_lls(j: &Array2<f64>, f: &Array1<f64>, d: &mut Array1<f64>) -> Result<()> {
    if j.nrows() != f.len() {
        return Err(NllsError::DimensionMismatch(format!(
            "least squares with a {}x{} matrix and a vector of length {}",
            j.nrows(),
            j.ncols(),
            f.len()
        )));
    }
    let svd = SVD::new(ndarray_to_nalgebra(j), true, true);
    let rhs = -ndarray_vec_to_nalgebra(f);
    let solution = svd
        .solve(&rhs, f64::EPSILON)
        .map_err(|_| NllsError::FromExternalSolver {
            routine: "svd_solve".to_string(),
            code: -1,
        })?;
    *d = nalgebra_vec_to_ndarray(&solution);
    Ok(())
}
