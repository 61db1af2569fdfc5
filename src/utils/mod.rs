//! Utility functions and helpers for the trnlls-rs library.

pub mod finite_difference;
pub mod matrix_convert;
