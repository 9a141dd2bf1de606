//! # Masked Reductions
//!
//! Reductions over one dimension that only consider the entries selected by a
//! float mask. Burn has no native masked `max_dim`/`min_dim`, so exclusion is
//! expressed arithmetically and stays differentiable:
//!
//! - **max**: excluded entries are multiplied by zero. Only valid when every
//!   candidate is non-negative, which holds for distance matrices.
//! - **min**: excluded entries are pushed up by the maximum of their slice, so
//!   they can never be strictly smaller than an included entry.
//!
//! The mask is usually exactly `0`/`1`. Fractional masks are accepted and
//! scale the exclusion accordingly.

use burn::prelude::*;

/// Maximum of `values * mask` along `dim`, keeping the reduced dimension.
///
/// # Shapes
/// - values: `[..., n, ...]`
/// - mask: same shape as `values`
/// - output: `[..., 1, ...]`
pub fn masked_max_dim<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    mask: Tensor<B, D>,
    dim: usize,
) -> Tensor<B, D> {
    (values * mask).max_dim(dim)
}

/// Same as [`masked_max_dim`] but also returns the position of the selected entry.
pub fn masked_max_dim_with_indices<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    mask: Tensor<B, D>,
    dim: usize,
) -> (Tensor<B, D>, Tensor<B, D, Int>) {
    (values * mask).max_dim_with_indices(dim)
}

/// Minimum along `dim` after inflating excluded entries by their slice maximum.
///
/// When no entry of a slice is included, every entry is inflated and the
/// result is the smallest inflated value rather than an error.
///
/// # Shapes
/// - values: `[..., n, ...]`
/// - mask: same shape as `values`
/// - output: `[..., 1, ...]`
pub fn masked_min_dim<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    mask: Tensor<B, D>,
    dim: usize,
) -> Tensor<B, D> {
    inflate_excluded(values, mask, dim).min_dim(dim)
}

/// Same as [`masked_min_dim`] but also returns the position of the selected entry.
pub fn masked_min_dim_with_indices<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    mask: Tensor<B, D>,
    dim: usize,
) -> (Tensor<B, D>, Tensor<B, D, Int>) {
    inflate_excluded(values, mask, dim).min_dim_with_indices(dim)
}

/// `values + max(values, dim) * (1 - mask)`
fn inflate_excluded<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    mask: Tensor<B, D>,
    dim: usize,
) -> Tensor<B, D> {
    let dims = values.dims();
    let slice_max = values.clone().max_dim(dim).expand(dims);

    values + slice_max * mask.neg().add_scalar(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::{ops::FloatElem, TensorData, Tolerance},
    };

    type TestBackend = NdArray<f32>;
    type FT = FloatElem<TestBackend>;

    fn values(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        Tensor::from_floats([[0.0, 3.0, 1.0, 2.0], [4.0, 0.0, 5.0, 6.0]], device)
    }

    #[test]
    fn masked_max_ignores_excluded_entries() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 0.0, 1.0, 1.0], [1.0, 0.0, 0.0, 0.0]],
            &device,
        );

        let (max, indices) = masked_max_dim_with_indices(values(&device), mask, 1);

        max.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[2.0], [4.0]]), Tolerance::default());
        assert_eq!(
            indices.into_data().to_vec::<i64>().unwrap(),
            vec![3, 0],
            "indices point at the selected columns"
        );
    }

    #[test]
    fn masked_min_skips_excluded_smaller_entries() {
        let device = Default::default();
        // Row 0 excludes the zero at column 0, row 1 excludes the zero at column 1.
        let mask = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 1.0, 1.0, 1.0], [1.0, 0.0, 1.0, 1.0]],
            &device,
        );

        let (min, indices) = masked_min_dim_with_indices(values(&device), mask, 1);

        min.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[1.0], [4.0]]), Tolerance::default());
        assert_eq!(indices.into_data().to_vec::<i64>().unwrap(), vec![2, 0]);
    }

    #[test]
    fn masked_min_with_empty_mask_returns_inflated_value() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 2>::zeros([2, 4], &device);

        let min = masked_min_dim(values(&device), mask, 1);

        // Smallest entry plus the row maximum.
        min.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[3.0], [6.0]]), Tolerance::default());
    }

    #[test]
    fn masked_max_over_first_dimension() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 1.0, 1.0, 1.0], [0.0, 0.0, 0.0, 0.0]],
            &device,
        );

        let max = masked_max_dim(values(&device), mask, 0);

        max.into_data().assert_approx_eq::<FT>(
            &TensorData::from([[0.0, 3.0, 1.0, 2.0]]),
            Tolerance::default(),
        );
    }

    #[test]
    fn masked_min_gradient_flows_only_to_selected_entry() {
        let device = Default::default();
        let x = Tensor::<Autodiff<TestBackend>, 2>::from_floats([[2.0, 1.0, 3.0]], &device)
            .require_grad();
        let mask =
            Tensor::<Autodiff<TestBackend>, 2>::from_floats([[1.0, 0.0, 1.0]], &device);

        let grads = masked_min_dim(x.clone(), mask, 1).sum().backward();
        let grad = x.grad(&grads).expect("gradient is tracked");

        // Inflated row is [2, 4, 3]; the row maximum only feeds column 1's term.
        grad.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[1.0, 0.0, 0.0]]), Tolerance::default());
    }
}
