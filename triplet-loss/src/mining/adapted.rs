//! Mining strategies with the centroid alignment penalty.
//!
//! Both strategies mine one positive and one negative per anchor, average the
//! hinge over the anchors and add `lambda * l_match`, where `l_match` is the
//! [centroid alignment penalty](crate::centroid::centroid_alignment_penalty)
//! evaluated on the mined indices.
//!
//! - [`BatchHardSemiAdaptedLoss`] mines like
//!   [`BatchHardSemiLoss`](super::BatchHardSemiLoss).
//! - [`BatchAdaptedLoss`] rescales the masks with random weights before hard
//!   mining: integer weights in `0..10` on the positives and uniform `[0, 1)`
//!   weights on the negatives. The rescaled distances are the ones that enter
//!   the hinge.

use burn::{config::Config, prelude::*};

use super::{mine_hardest, HardestPairs};
use crate::{
    centroid::{centroid_alignment_penalty, resolve_class_ids},
    config::ClassSet,
    distance::pairwise_distances,
    mask::{anchor_negative_mask, anchor_positive_mask},
    output::{hinge, TripletLossOutput},
    perturbation::{weight_matrix, PerturbationSource},
};

/// Configuration for creating a [semi-hard adapted loss](BatchHardSemiAdaptedLoss).
#[derive(Config, Debug)]
pub struct BatchHardSemiAdaptedLossConfig {
    /// Margin between positive and negative distances. Default: 1.0
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances. Default: false
    #[config(default = false)]
    pub squared: bool,
    /// Weight of the centroid alignment penalty. Default: 1.0
    #[config(default = 1.0)]
    pub lambda: f64,
    /// Classes enumerated by the centroid alignment penalty. Default: `Range(8)`
    #[config(default = "ClassSet::Range(8)")]
    pub class_set: ClassSet,
}

impl BatchHardSemiAdaptedLossConfig {
    /// Initialize [semi-hard adapted loss](BatchHardSemiAdaptedLoss).
    pub fn init(&self) -> BatchHardSemiAdaptedLoss {
        check_adapted_parameters("BatchHardSemiAdaptedLoss", self.margin, self.lambda);
        BatchHardSemiAdaptedLoss {
            margin: self.margin,
            squared: self.squared,
            lambda: self.lambda,
            class_set: self.class_set.clone(),
        }
    }
}

/// Semi-hard batch triplet loss plus the centroid alignment penalty.
#[derive(Clone, Debug)]
pub struct BatchHardSemiAdaptedLoss {
    /// Margin between positive and negative distances.
    pub margin: f64,
    /// Use squared Euclidean distances.
    pub squared: bool,
    /// Weight of the centroid alignment penalty.
    pub lambda: f64,
    /// Classes enumerated by the centroid alignment penalty.
    pub class_set: ClassSet,
}

impl Default for BatchHardSemiAdaptedLoss {
    fn default() -> Self {
        BatchHardSemiAdaptedLossConfig::new().init()
    }
}

impl BatchHardSemiAdaptedLoss {
    /// Compute the loss and the unweighted centroid penalty.
    ///
    /// # Shapes
    ///
    /// - labels: `[N]`
    /// - embeddings: `[N, D]`
    /// - loss: `[1]`
    pub fn forward<B: Backend>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
    ) -> TripletLossOutput<B> {
        let distances = pairwise_distances(embeddings.clone(), self.squared);

        let pairs = mine_hardest(
            distances,
            anchor_positive_mask(labels.clone()).float(),
            anchor_negative_mask(labels.clone()).float(),
            Some(self.margin),
        );

        adapted_output(
            labels,
            embeddings,
            pairs,
            self.margin,
            self.lambda,
            &self.class_set,
        )
    }
}

/// Configuration for creating a [batch-adapted loss](BatchAdaptedLoss).
#[derive(Config, Debug)]
pub struct BatchAdaptedLossConfig {
    /// Margin between positive and negative distances. Default: 1.0
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances. Default: false
    #[config(default = false)]
    pub squared: bool,
    /// Weight of the centroid alignment penalty. Default: 1.0
    #[config(default = 1.0)]
    pub lambda: f64,
    /// Classes enumerated by the centroid alignment penalty. Default: `Range(8)`
    #[config(default = "ClassSet::Range(8)")]
    pub class_set: ClassSet,
}

impl BatchAdaptedLossConfig {
    /// Initialize [batch-adapted loss](BatchAdaptedLoss).
    pub fn init(&self) -> BatchAdaptedLoss {
        check_adapted_parameters("BatchAdaptedLoss", self.margin, self.lambda);
        BatchAdaptedLoss {
            margin: self.margin,
            squared: self.squared,
            lambda: self.lambda,
            class_set: self.class_set.clone(),
        }
    }
}

/// Randomly reweighted batch-hard loss plus the centroid alignment penalty.
#[derive(Clone, Debug)]
pub struct BatchAdaptedLoss {
    /// Margin between positive and negative distances.
    pub margin: f64,
    /// Use squared Euclidean distances.
    pub squared: bool,
    /// Weight of the centroid alignment penalty.
    pub lambda: f64,
    /// Classes enumerated by the centroid alignment penalty.
    pub class_set: ClassSet,
}

impl Default for BatchAdaptedLoss {
    fn default() -> Self {
        BatchAdaptedLossConfig::new().init()
    }
}

impl BatchAdaptedLoss {
    /// Compute the loss and the unweighted centroid penalty.
    ///
    /// `perturbation` supplies the mask weights; any [`rand::Rng`] works.
    ///
    /// # Shapes
    ///
    /// - labels: `[N]`
    /// - embeddings: `[N, D]`
    /// - loss: `[1]`
    pub fn forward<B: Backend, P: PerturbationSource + ?Sized>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
        perturbation: &mut P,
    ) -> TripletLossOutput<B> {
        let [n, _] = embeddings.dims();
        let device = embeddings.device();
        let distances = pairwise_distances(embeddings.clone(), self.squared);

        let positive_weights = weight_matrix::<B>(perturbation.positive_weights(n * n), n, &device)
            * anchor_positive_mask(labels.clone()).float();
        let negative_weights = weight_matrix::<B>(perturbation.negative_weights(n * n), n, &device)
            * anchor_negative_mask(labels.clone()).float();

        let pairs = mine_hardest(distances, positive_weights, negative_weights, None);

        adapted_output(
            labels,
            embeddings,
            pairs,
            self.margin,
            self.lambda,
            &self.class_set,
        )
    }
}

fn check_adapted_parameters(name: &str, margin: f64, lambda: f64) {
    assert!(
        margin > 0.0,
        "Margin for {name} must be positive, got {margin}"
    );
    assert!(
        lambda >= 0.0,
        "Lambda for {name} must be non-negative, got {lambda}"
    );
}

fn adapted_output<B: Backend>(
    labels: Tensor<B, 1, Int>,
    embeddings: Tensor<B, 2>,
    pairs: HardestPairs<B>,
    margin: f64,
    lambda: f64,
    class_set: &ClassSet,
) -> TripletLossOutput<B> {
    let [n, _] = embeddings.dims();
    let class_ids = resolve_class_ids(class_set, &labels);

    let penalty = centroid_alignment_penalty(
        labels,
        embeddings,
        pairs.positive_index.reshape([n]),
        pairs.negative_index.reshape([n]),
        &class_ids,
    );
    let triplet_loss = hinge(pairs.positive_dist, pairs.negative_dist, margin)
        .reshape([n])
        .mean();

    TripletLossOutput::new(triplet_loss + penalty.clone().mul_scalar(lambda))
        .with_centroid_penalty(penalty)
}
