//! Pairwise distance matrix between the embeddings of a batch.
//!
//! The matrix is built from the Gram matrix `G = E·Eᵗ` using
//!
//! ```text
//! ||a - b||² = ||a||² - 2 <a, b> + ||b||²
//! ```
//!
//! which costs one matmul instead of an `[N, N, D]` difference tensor. The
//! squared norms are read off the diagonal of `G`, which makes the diagonal of
//! the result exactly zero.

use burn::prelude::*;
use burn_extra_ops::{safe_sqrt, SQRT_EPSILON};

use crate::mask::identity_mask;

/// Compute the `[N, N]` distance matrix of `embeddings`.
///
/// Rounding can make the expansion slightly negative; such entries are
/// clamped to zero. For Euclidean (non-squared) output the square root is
/// taken with [`safe_sqrt`], so the zero diagonal keeps a finite gradient.
/// Non-finite embeddings are not guarded against and propagate as NaN.
///
/// # Shapes
/// - embeddings: `[N, D]`
/// - output: `[N, N]`
pub fn pairwise_distances<B: Backend>(embeddings: Tensor<B, 2>, squared: bool) -> Tensor<B, 2> {
    let [n, _] = embeddings.dims();
    let device = embeddings.device();

    let dot_product = embeddings.clone().matmul(embeddings.transpose());

    // shape [N, 1]
    let square_norm = (dot_product.clone() * identity_mask::<B>(n, &device).float()).sum_dim(1);

    let distances = square_norm.clone().expand([n, n]) - dot_product.mul_scalar(2.0)
        + square_norm.transpose().expand([n, n]);
    let distances = distances.clamp_min(0.0);

    if squared {
        distances
    } else {
        safe_sqrt(distances, SQRT_EPSILON)
    }
}
