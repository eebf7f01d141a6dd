//! Residual models shared by backends.
//!
//! Every residual is written once, generic over `RealField`, so backends can
//! evaluate it with plain `f64` or with dual numbers for autodiff.

pub mod priors;
pub mod reprojection;

use nalgebra::RealField;

/// Lift an `f64` constant into the scalar type of a residual.
#[inline]
pub(crate) fn lit<T: RealField>(v: f64) -> T {
    nalgebra::convert(v)
}
