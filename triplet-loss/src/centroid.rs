//! Class-centroid alignment penalty used by the adapted mining strategies.
//!
//! For a class `c` let `μ⁺` be the mean embedding of its members and `μ⁻` the
//! mean embedding of everything else. Mining picks a positive and a negative
//! for every member; `s⁺` and `s⁻` are the means of those picks. The penalty
//! compares the two triples row by row:
//!
//! ```text
//! dt = [μ⁺, μ⁺, μ⁻]
//! ds = [μ⁺, s⁺, s⁻]
//! l_match = Σ_c ||dt - ds||_F
//! ```
//!
//! Means divide by `count + CENTROID_EPSILON`, so a class without members has
//! zero vectors for `μ⁺`, `s⁺` and `s⁻`.

use burn::prelude::*;
use burn_extra_ops::{safe_sqrt, SQRT_EPSILON};

use crate::config::ClassSet;

/// Added to member counts before dividing by them.
pub const CENTROID_EPSILON: f64 = 1e-15;

/// Mean embeddings of one class and of its complement.
#[derive(Debug, Clone)]
pub struct ClassCentroids<B: Backend> {
    /// Mean embedding of the class members, shape `[1, D]`.
    pub positive: Tensor<B, 2>,
    /// Mean embedding of the non-members, shape `[1, D]`.
    pub negative: Tensor<B, 2>,
}

/// Compute the centroids of `class_id` and of its complement.
///
/// # Shapes
/// - labels: `[N]`
/// - embeddings: `[N, D]`
pub fn class_centroids<B: Backend>(
    labels: Tensor<B, 1, Int>,
    embeddings: Tensor<B, 2>,
    class_id: i64,
) -> ClassCentroids<B> {
    let [n] = labels.dims();
    let members = labels.equal_elem(class_id).float().reshape([1, n]);
    let outsiders = members.clone().neg().add_scalar(1.0);

    ClassCentroids {
        positive: masked_mean(members, embeddings.clone()),
        negative: masked_mean(outsiders, embeddings),
    }
}

/// Sum over `class_ids` of the Frobenius distance between the centroid triple
/// and the triple of selected-sample means.
///
/// `positive_index[a]` and `negative_index[a]` are the batch indices mined for
/// anchor `a`.
///
/// # Shapes
/// - labels: `[N]`
/// - embeddings: `[N, D]`
/// - positive_index: `[N]`
/// - negative_index: `[N]`
/// - output: `[1]`
pub fn centroid_alignment_penalty<B: Backend>(
    labels: Tensor<B, 1, Int>,
    embeddings: Tensor<B, 2>,
    positive_index: Tensor<B, 1, Int>,
    negative_index: Tensor<B, 1, Int>,
    class_ids: &[i64],
) -> Tensor<B, 1> {
    let [n] = labels.dims();
    if class_ids.is_empty() {
        return Tensor::zeros([1], &embeddings.device());
    }

    let selected_positive = embeddings.clone().select(0, positive_index);
    let selected_negative = embeddings.clone().select(0, negative_index);

    let terms = class_ids
        .iter()
        .map(|&class_id| {
            let members = labels
                .clone()
                .equal_elem(class_id)
                .float()
                .reshape([1, n]);
            let centroids = class_centroids(labels.clone(), embeddings.clone(), class_id);

            let selected_positive_mean = masked_mean(members.clone(), selected_positive.clone());
            let selected_negative_mean = masked_mean(members, selected_negative.clone());

            let target = Tensor::cat(
                vec![
                    centroids.positive.clone(),
                    centroids.positive.clone(),
                    centroids.negative,
                ],
                0,
            );
            let selected = Tensor::cat(
                vec![
                    centroids.positive,
                    selected_positive_mean,
                    selected_negative_mean,
                ],
                0,
            );

            frobenius_norm(target - selected)
        })
        .collect::<Vec<_>>();

    Tensor::cat(terms, 0).sum()
}

/// Resolve the class identifiers for `labels`.
///
/// Labels outside a [`ClassSet::Range`] take no part in the penalty; this is
/// reported once per call.
pub fn resolve_class_ids<B: Backend>(class_set: &ClassSet, labels: &Tensor<B, 1, Int>) -> Vec<i64> {
    let host_labels = labels.to_data().iter::<i64>().collect::<Vec<_>>();
    let class_ids = class_set.class_ids(&host_labels);

    if let ClassSet::Range(num_classes) = class_set {
        if let Some(label) = host_labels
            .iter()
            .find(|label| class_ids.binary_search(label).is_err())
        {
            tracing::warn!(
                label = *label,
                num_classes = *num_classes,
                "label outside the configured class range is ignored by the centroid penalty"
            );
        }
    }

    class_ids
}

/// `weights · values / (Σ weights + CENTROID_EPSILON)`
///
/// # Shapes
/// - weights: `[1, N]`
/// - values: `[N, D]`
/// - output: `[1, D]`
fn masked_mean<B: Backend>(weights: Tensor<B, 2>, values: Tensor<B, 2>) -> Tensor<B, 2> {
    let [_, d] = values.dims();
    let count = weights
        .clone()
        .sum()
        .add_scalar(CENTROID_EPSILON)
        .reshape([1, 1])
        .expand([1, d]);

    weights.matmul(values) / count
}

fn frobenius_norm<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 1> {
    safe_sqrt((x.clone() * x).sum(), SQRT_EPSILON)
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::{ops::FloatElem, Tolerance},
    };

    use super::*;

    type TestBackend = NdArray<f32>;
    type FT = FloatElem<TestBackend>;

    fn ints(values: &[i64]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len()]),
            &Default::default(),
        )
    }

    fn line() -> Tensor<TestBackend, 2> {
        Tensor::from_floats([[0.0], [2.0], [10.0], [14.0]], &Default::default())
    }

    #[test]
    fn class_centroids_average_members_and_complement() {
        let embeddings = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 0.0], [2.0, 0.0], [0.0, 4.0], [10.0, 10.0]],
            &Default::default(),
        );

        let centroids = class_centroids(ints(&[0, 0, 1, 2]), embeddings, 0);

        centroids
            .positive
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[1.0, 0.0]]), Tolerance::default());
        centroids
            .negative
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[5.0, 7.0]]), Tolerance::default());
    }

    #[test]
    fn empty_class_has_zero_centroid() {
        let centroids = class_centroids(ints(&[0, 0, 1, 1]), line(), 5);

        centroids
            .positive
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[0.0]]), Tolerance::default());
        centroids
            .negative
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[6.5]]), Tolerance::default());
    }

    #[test]
    fn penalty_vanishes_when_selections_match_centroids() {
        let penalty = centroid_alignment_penalty(
            ints(&[0, 0, 1, 1]),
            line(),
            ints(&[1, 0, 3, 2]),
            ints(&[2, 3, 0, 1]),
            &[0, 1],
        );

        penalty
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([0.0]), Tolerance::default());
    }

    #[test]
    fn penalty_sums_per_class_distances() {
        // Class 0 negatives average 10 instead of 12, class 1 negatives 0 instead of 1.
        let penalty = centroid_alignment_penalty(
            ints(&[0, 0, 1, 1]),
            line(),
            ints(&[1, 0, 3, 2]),
            ints(&[2, 2, 0, 0]),
            &[0, 1],
        );

        penalty
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([3.0]), Tolerance::default());
    }

    #[test]
    fn empty_class_contributes_norm_of_complement_centroid() {
        let penalty = centroid_alignment_penalty(
            ints(&[0, 0, 1, 1]),
            line(),
            ints(&[1, 0, 3, 2]),
            ints(&[2, 3, 0, 1]),
            &[0, 1, 2],
        );

        penalty
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([6.5]), Tolerance::default());
    }

    #[test]
    fn penalty_without_classes_is_zero() {
        let penalty =
            centroid_alignment_penalty(ints(&[0, 1]), line().slice([0..2]), ints(&[0, 1]), ints(&[1, 0]), &[]);

        penalty
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([0.0]), Tolerance::default());
    }

    #[test]
    fn zero_penalty_has_finite_gradient() {
        let device = Default::default();
        let embeddings =
            Tensor::<Autodiff<TestBackend>, 2>::from_floats([[0.0], [2.0], [10.0], [14.0]], &device)
                .require_grad();
        let index = |values: [i64; 4]| {
            Tensor::<Autodiff<TestBackend>, 1, Int>::from_ints(values, &device)
        };

        let penalty = centroid_alignment_penalty(
            index([0, 0, 1, 1]),
            embeddings.clone(),
            index([1, 0, 3, 2]),
            index([2, 3, 0, 1]),
            &[0, 1],
        );
        let grads = penalty.backward();
        let grad = embeddings.grad(&grads).expect("gradient is tracked");

        assert!(grad
            .into_data()
            .to_vec::<f32>()
            .unwrap()
            .iter()
            .all(|g| g.is_finite()));
    }

    #[test]
    fn present_class_set_uses_batch_labels() {
        let class_ids = resolve_class_ids(&ClassSet::Present, &ints(&[7, 3, 7, 1]));
        let range_ids = resolve_class_ids(&ClassSet::Range(3), &ints(&[7, 3, 7, 1]));

        assert_eq!(class_ids, vec![1, 3, 7]);
        assert_eq!(range_ids, vec![0, 1, 2]);
    }
}
