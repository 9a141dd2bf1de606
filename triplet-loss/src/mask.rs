//! Validity masks for anchor/positive/negative selection.
//!
//! All masks are derived from the label vector alone:
//!
//! ```text
//! anchor_positive[a, p]  = a != p && label[a] == label[p]
//! anchor_negative[a, n]  = label[a] != label[n]
//! triplet[a, p, n]       = a, p, n distinct && label[a] == label[p] && label[a] != label[n]
//! ```
//!
//! `anchor_negative` does not test `a != n` explicitly: a sample always shares
//! its own label, so the diagonal is false by construction.

use burn::prelude::*;

/// `[N, N]` mask that is true on the diagonal.
pub fn identity_mask<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    pairwise_equal(Tensor::<B, 1, Int>::arange(0..n as i64, device))
}

/// `mask[a, p]` is true iff `a` and `p` are distinct and share a label.
///
/// # Shapes
/// - labels: `[N]`
/// - output: `[N, N]`
pub fn anchor_positive_mask<B: Backend>(labels: Tensor<B, 1, Int>) -> Tensor<B, 2, Bool> {
    let [n] = labels.dims();
    let indices_not_equal = identity_mask::<B>(n, &labels.device()).bool_not();

    pairwise_equal(labels).bool_and(indices_not_equal)
}

/// `mask[a, n]` is true iff `a` and `n` have different labels.
///
/// # Shapes
/// - labels: `[N]`
/// - output: `[N, N]`
pub fn anchor_negative_mask<B: Backend>(labels: Tensor<B, 1, Int>) -> Tensor<B, 2, Bool> {
    pairwise_equal(labels).bool_not()
}

/// `mask[a, p, n]` is true iff `(a, p, n)` is a valid triplet.
///
/// # Shapes
/// - labels: `[N]`
/// - output: `[N, N, N]`
pub fn triplet_mask<B: Backend>(labels: Tensor<B, 1, Int>) -> Tensor<B, 3, Bool> {
    let [n] = labels.dims();
    let shape = [n, n, n];

    let indices_not_equal = identity_mask::<B>(n, &labels.device()).bool_not();
    let i_not_equal_j = indices_not_equal
        .clone()
        .unsqueeze_dim::<3>(2)
        .expand(shape);
    let i_not_equal_k = indices_not_equal
        .clone()
        .unsqueeze_dim::<3>(1)
        .expand(shape);
    let j_not_equal_k = indices_not_equal.unsqueeze_dim::<3>(0).expand(shape);
    let distinct_indices = i_not_equal_j.bool_and(i_not_equal_k).bool_and(j_not_equal_k);

    let label_equal = pairwise_equal(labels);
    let i_equal_j = label_equal.clone().unsqueeze_dim::<3>(2).expand(shape);
    let i_equal_k = label_equal.unsqueeze_dim::<3>(1).expand(shape);
    let valid_labels = i_equal_j.bool_and(i_equal_k.bool_not());

    valid_labels.bool_and(distinct_indices)
}

/// `out[i, j] = values[i] == values[j]`
fn pairwise_equal<B: Backend>(values: Tensor<B, 1, Int>) -> Tensor<B, 2, Bool> {
    let [n] = values.dims();
    let rows = values.clone().reshape([n, 1]).expand([n, n]);
    let cols = values.reshape([1, n]).expand([n, n]);

    rows.equal(cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn labels(values: &[i64]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), &Default::default())
    }

    fn count<const D: usize>(mask: Tensor<TestBackend, D, Bool>) -> usize {
        mask.into_data()
            .to_vec::<bool>()
            .unwrap()
            .into_iter()
            .filter(|&v| v)
            .count()
    }

    #[test]
    fn anchor_positive_mask_excludes_diagonal_and_other_classes() {
        let mask = anchor_positive_mask(labels(&[0, 0, 1]));

        assert_eq!(
            mask.into_data().to_vec::<bool>().unwrap(),
            vec![false, true, false, true, false, false, false, false, false]
        );
    }

    #[test]
    fn anchor_negative_mask_never_pairs_sample_with_itself() {
        let mask = anchor_negative_mask(labels(&[3, 1, 3, 2, 1]));
        let values = mask.into_data().to_vec::<bool>().unwrap();

        for a in 0..5 {
            assert!(!values[a * 5 + a], "sample {a} is its own negative");
        }
    }

    #[test]
    fn positive_and_negative_masks_are_mutually_exclusive() {
        let labels = labels(&[0, 1, 0, 2, 1, 1, 0]);
        let positive = anchor_positive_mask(labels.clone())
            .into_data()
            .to_vec::<bool>()
            .unwrap();
        let negative = anchor_negative_mask(labels)
            .into_data()
            .to_vec::<bool>()
            .unwrap();

        for (index, (p, n)) in positive.iter().zip(negative.iter()).enumerate() {
            let (a, x) = (index / 7, index % 7);
            assert!(!(*p && *n), "pair ({a}, {x}) is both positive and negative");
            if a != x {
                assert!(*p || *n, "pair ({a}, {x}) is neither positive nor negative");
            }
        }
    }

    #[test]
    fn triplet_mask_count_matches_class_partition() {
        // sum over classes of n_c * (n_c - 1) * (N - n_c) = 2 * (3 * 2 * 3)
        assert_eq!(count(triplet_mask(labels(&[0, 0, 0, 1, 1, 1]))), 36);

        // Uneven partition {3, 2, 1} with N = 6: 3*2*3 + 2*1*4 + 0 = 26
        assert_eq!(count(triplet_mask(labels(&[4, 4, 4, 7, 7, 9]))), 26);
    }

    #[test]
    fn triplet_mask_agrees_with_pairwise_masks() {
        let labels = labels(&[0, 1, 1, 0, 2]);
        let triplets = triplet_mask(labels.clone())
            .into_data()
            .to_vec::<bool>()
            .unwrap();
        let positive = anchor_positive_mask(labels.clone())
            .into_data()
            .to_vec::<bool>()
            .unwrap();
        let negative = anchor_negative_mask(labels)
            .into_data()
            .to_vec::<bool>()
            .unwrap();

        for a in 0..5 {
            for p in 0..5 {
                for n in 0..5 {
                    let expected = positive[a * 5 + p] && negative[a * 5 + n] && p != n;
                    assert_eq!(triplets[(a * 5 + p) * 5 + n], expected, "({a}, {p}, {n})");
                }
            }
        }
    }

    #[test]
    fn single_class_batch_has_no_negatives() {
        let labels = labels(&[5, 5, 5, 5]);

        assert_eq!(count(anchor_negative_mask(labels.clone())), 0);
        assert_eq!(count(triplet_mask(labels)), 0);
    }
}
