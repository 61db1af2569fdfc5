//! Matrix conversion utilities for the trnlls-rs library.
//!
//! The solver keeps all of its state in ndarray containers. The factorizations
//! that need a mature implementation (symmetric eigendecomposition, SVD, real
//! Schur form) come from nalgebra, so these helpers move data across the
//! boundary.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

// === ndarray <-> nalgebra conversions ===

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// ndarray is row-major by default while nalgebra is column-major, so the copy
/// goes element by element.
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a nalgebra DMatrix to an ndarray Array2.
pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

/// Convert a nalgebra DVector to an ndarray Array1.
pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    Array1::from_iter(vec.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ndarray_nalgebra_roundtrip_f64() {
        let arr = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        let nalgebra_mat = ndarray_to_nalgebra(&arr);
        assert_eq!(nalgebra_mat[(1, 0)], 4.0);
        assert_eq!(nalgebra_mat[(0, 2)], 3.0);

        let arr2 = nalgebra_to_ndarray(&nalgebra_mat);
        assert_eq!(arr.shape(), arr2.shape());
        for i in 0..arr.nrows() {
            for j in 0..arr.ncols() {
                assert_relative_eq!(arr[[i, j]], arr2[[i, j]]);
            }
        }
    }

    #[test]
    fn test_vector_roundtrip_and_empty() {
        let v = Array1::from_vec(vec![1.5, -2.0, 3.25]);
        let back = nalgebra_vec_to_ndarray(&ndarray_vec_to_nalgebra(&v));
        assert_eq!(v, back);

        let empty = Array2::<f64>::zeros((0, 0));
        assert_eq!(ndarray_to_nalgebra(&empty).nrows(), 0);
    }
}
