//! Additional operations for the Burn deep learning framework
//!
//! This crate provides the masked reductions and gradient-safe elementwise
//! operations that metric-learning losses need but the core Burn framework
//! does not offer.

use burn::prelude::*;

mod masked;
mod sqrt;

// Convenient re-exports
pub use masked::{
    masked_max_dim, masked_max_dim_with_indices, masked_min_dim, masked_min_dim_with_indices,
};
pub use sqrt::{safe_sqrt, SQRT_EPSILON};

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Maximum along `dim` over the entries where `mask` is set.
    fn masked_max_dim(self, mask: Tensor<B, D>, dim: usize) -> Self;

    /// Minimum along `dim` over the entries where `mask` is set.
    fn masked_min_dim(self, mask: Tensor<B, D>, dim: usize) -> Self;

    /// Square root with a zero-safe gradient.
    fn safe_sqrt(self, eps: f64) -> Self;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn masked_max_dim(self, mask: Tensor<B, D>, dim: usize) -> Self {
        masked_max_dim(self, mask, dim)
    }

    fn masked_min_dim(self, mask: Tensor<B, D>, dim: usize) -> Self {
        masked_min_dim(self, mask, dim)
    }

    fn safe_sqrt(self, eps: f64) -> Self {
        safe_sqrt(self, eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::Tensor,
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_tensor_extra_ops() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::random(
            [3, 5],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let mask = Tensor::<TestBackend, 2>::ones([3, 5], &device);

        assert_eq!(tensor.clone().masked_max_dim(mask.clone(), 1).dims(), [3, 1]);
        assert_eq!(tensor.clone().masked_min_dim(mask, 0).dims(), [1, 5]);
        assert_eq!(tensor.clone().safe_sqrt(SQRT_EPSILON).dims(), tensor.dims());
    }
}
