//! Reduction of per-anchor and per-triplet hinge losses to a scalar.

use burn::{prelude::*, tensor::activation::relu};

/// Losses at or below this value do not count as active triplets.
pub const POSITIVE_LOSS_THRESHOLD: f64 = 1e-16;

/// Added to triplet counts before dividing by them.
pub const COUNT_EPSILON: f64 = 1e-16;

/// Scalar loss of one evaluation plus its diagnostics.
///
/// Only `loss` carries a meaningful gradient. The diagnostics are reported for
/// monitoring the mining and should not be backpropagated.
#[derive(Debug, Clone)]
pub struct TripletLossOutput<B: Backend> {
    /// Scalar loss with shape `[1]`.
    pub loss: Tensor<B, 1>,
    /// Fraction of valid triplets with a positive loss (batch-all mining only).
    pub fraction_positive: Option<Tensor<B, 1>>,
    /// Unweighted centroid alignment penalty `l_match` (adapted mining only).
    pub centroid_penalty: Option<Tensor<B, 1>>,
}

impl<B: Backend> TripletLossOutput<B> {
    /// Wrap a scalar loss without diagnostics.
    pub const fn new(loss: Tensor<B, 1>) -> Self {
        Self {
            loss,
            fraction_positive: None,
            centroid_penalty: None,
        }
    }

    /// Attach the fraction of active triplets.
    pub fn with_fraction_positive(mut self, fraction_positive: Tensor<B, 1>) -> Self {
        self.fraction_positive = Some(fraction_positive);
        self
    }

    /// Attach the centroid alignment penalty.
    pub fn with_centroid_penalty(mut self, centroid_penalty: Tensor<B, 1>) -> Self {
        self.centroid_penalty = Some(centroid_penalty);
        self
    }
}

/// `relu(positive - negative + margin)`
pub fn hinge<B: Backend, const D: usize>(
    positive_dist: Tensor<B, D>,
    negative_dist: Tensor<B, D>,
    margin: f64,
) -> Tensor<B, D> {
    relu((positive_dist - negative_dist).add_scalar(margin))
}

/// Mean of `losses` over the entries selected by the 0/1 `selected` mask.
///
/// Returns zero when nothing is selected.
pub fn mean_over_selected<B: Backend, const D: usize>(
    losses: Tensor<B, D>,
    selected: Tensor<B, D>,
) -> Tensor<B, 1> {
    let count = selected.clone().sum().add_scalar(COUNT_EPSILON);
    (losses * selected).sum() / count
}

/// Sum of `losses` divided by the number of active (positive) entries.
///
/// Returns the scalar loss and the active-entry count.
pub fn mean_over_active<B: Backend, const D: usize>(
    losses: Tensor<B, D>,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let active = losses
        .clone()
        .greater_elem(POSITIVE_LOSS_THRESHOLD)
        .float()
        .sum();
    let loss = losses.sum() / active.clone().add_scalar(COUNT_EPSILON);

    (loss, active)
}

/// `count / (total + COUNT_EPSILON)`
pub fn fraction<B: Backend>(count: Tensor<B, 1>, total: Tensor<B, 1>) -> Tensor<B, 1> {
    count / total.add_scalar(COUNT_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        tensor::{ops::FloatElem, Tolerance},
    };

    type TestBackend = NdArray<f32>;
    type FT = FloatElem<TestBackend>;

    #[test]
    fn hinge_clips_satisfied_triplets() {
        let device = Default::default();
        let positive = Tensor::<TestBackend, 1>::from_floats([1.0, 3.0, 2.0], &device);
        let negative = Tensor::<TestBackend, 1>::from_floats([5.0, 2.0, 2.5], &device);

        hinge(positive, negative, 1.0)
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([0.0, 2.0, 0.5]), Tolerance::default());
    }

    #[test]
    fn mean_over_selected_ignores_unselected_and_handles_empty_selection() {
        let device = Default::default();
        let losses = Tensor::<TestBackend, 2>::from_floats([[1.0, 9.0], [3.0, 9.0]], &device);
        let selected = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [1.0, 0.0]], &device);

        mean_over_selected(losses.clone(), selected)
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([2.0]), Tolerance::default());

        let empty = mean_over_selected(losses, Tensor::zeros([2, 2], &device));
        empty
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([0.0]), Tolerance::default());
    }

    #[test]
    fn mean_over_active_counts_positive_entries() {
        let device = Default::default();
        let losses = Tensor::<TestBackend, 1>::from_floats([0.0, 2.0, 0.0, 4.0], &device);

        let (loss, active) = mean_over_active(losses);
        let ratio = fraction(active.clone(), Tensor::from_floats([4.0], &device));

        loss.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([3.0]), Tolerance::default());
        active
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([2.0]), Tolerance::default());
        ratio
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([0.5]), Tolerance::default());
    }
}
