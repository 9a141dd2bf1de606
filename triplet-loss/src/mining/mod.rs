//! Online triplet mining strategies.
//!
//! Every strategy starts from the same pairwise distance matrix and validity
//! masks and differs only in how it picks the positive and negative distance
//! that enter the margin hinge:
//!
//! | strategy                    | positive           | negative                                  |
//! |-----------------------------|--------------------|-------------------------------------------|
//! | batch-hard                  | farthest           | closest                                   |
//! | batch-hard-semi             | farthest           | closest inside the semi-hard band         |
//! | batch-all-positive-semi     | every positive     | one semi-hard negative per positive       |
//! | batch-hard-semi-adapted     | farthest           | semi-hard, plus centroid alignment        |
//! | batch-adapted               | randomly weighted  | randomly weighted, plus centroid alignment |
//! | batch-all                   | every triplet      | every triplet                             |

pub mod adapted;
pub mod batch_all;
pub mod batch_all_positive_semi;
pub mod batch_hard;
pub mod batch_hard_semi;

pub use adapted::{
    BatchAdaptedLoss, BatchAdaptedLossConfig, BatchHardSemiAdaptedLoss,
    BatchHardSemiAdaptedLossConfig,
};
pub use batch_all::{BatchAllLoss, BatchAllLossConfig};
pub use batch_all_positive_semi::{BatchAllPositiveSemiLoss, BatchAllPositiveSemiLossConfig};
pub use batch_hard::{BatchHardLoss, BatchHardLossConfig};
pub use batch_hard_semi::{BatchHardSemiLoss, BatchHardSemiLossConfig};

use burn::prelude::*;
use burn_extra_ops::{masked_max_dim_with_indices, masked_min_dim_with_indices};

/// Positive and negative picked for every anchor.
///
/// All tensors have shape `[N, 1]`.
#[derive(Debug, Clone)]
pub(crate) struct HardestPairs<B: Backend> {
    pub positive_dist: Tensor<B, 2>,
    pub positive_index: Tensor<B, 2, Int>,
    pub negative_dist: Tensor<B, 2>,
    pub negative_index: Tensor<B, 2, Int>,
}

/// Pick the farthest positive and the closest negative of every anchor.
///
/// `positive_weights` and `negative_weights` are the anchor-positive and
/// anchor-negative masks as floats, optionally rescaled. With
/// `semi_hard_margin`, negatives are further restricted to the band
/// `hardest_positive < d(a, n) < hardest_positive + margin`; an anchor
/// without any candidate in the band falls back to the inflated minimum.
pub(crate) fn mine_hardest<B: Backend>(
    distances: Tensor<B, 2>,
    positive_weights: Tensor<B, 2>,
    negative_weights: Tensor<B, 2>,
    semi_hard_margin: Option<f64>,
) -> HardestPairs<B> {
    let (positive_dist, positive_index) =
        masked_max_dim_with_indices(distances.clone(), positive_weights, 1);

    let negative_weights = match semi_hard_margin {
        Some(margin) => {
            negative_weights * semi_hard_band(distances.clone(), positive_dist.clone(), margin)
        }
        None => negative_weights,
    };
    let (negative_dist, negative_index) =
        masked_min_dim_with_indices(distances, negative_weights, 1);

    HardestPairs {
        positive_dist,
        positive_index,
        negative_dist,
        negative_index,
    }
}

/// `1.0` where `positive < d < positive + margin`, `0.0` elsewhere.
///
/// # Shapes
/// - distances: `[N, N]`
/// - positive_dist: `[N, 1]`
/// - output: `[N, N]`
pub(crate) fn semi_hard_band<B: Backend>(
    distances: Tensor<B, 2>,
    positive_dist: Tensor<B, 2>,
    margin: f64,
) -> Tensor<B, 2> {
    let dims = distances.dims();
    let lower = positive_dist.clone().expand(dims);
    let upper = positive_dist.add_scalar(margin).expand(dims);

    distances.clone().greater(lower).float() * distances.lower(upper).float()
}
