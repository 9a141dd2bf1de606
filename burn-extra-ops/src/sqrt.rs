//! # Gradient-Safe Square Root
//!
//! `d/dx sqrt(x)` is infinite at `x = 0`. Backpropagating through a plain
//! `sqrt` of a tensor holding exact zeros (a distance diagonal, an all-zero
//! difference) turns `0 * inf` into NaN. [`safe_sqrt`] shifts exact zeros by
//! `eps` before the root and multiplies them back to zero afterwards, so the
//! forward value is unchanged and the gradient at those entries is zero.

use burn::prelude::*;

/// Default shift applied to exact zeros.
pub const SQRT_EPSILON: f64 = 1e-16;

/// Elementwise square root that keeps exact zeros at zero with a finite gradient.
///
/// Negative inputs are not clamped.
pub fn safe_sqrt<B: Backend, const D: usize>(x: Tensor<B, D>, eps: f64) -> Tensor<B, D> {
    let zero_mask = x.clone().equal_elem(0.0).float();
    let shifted = x + zero_mask.clone() * eps;

    shifted.sqrt() * zero_mask.neg().add_scalar(1.0)
}
