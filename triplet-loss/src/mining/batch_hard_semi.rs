//! Batch-hard triplet loss with semi-hard negatives.
//!
//! The positive is the farthest one, as in batch-hard. The negative is the
//! closest one that is still farther than that positive but within the
//! margin:
//!
//! ```text
//! hp  = max_p d(a, p)
//! hn  = min { d(a, n) : hp < d(a, n) < hp + margin }
//! l_a = relu(hp - hn + margin)
//! ```
//!
//! An anchor without any negative in the band gets the inflated row minimum
//! (the row maximum), which usually makes its term vanish.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    tensor::{backend::Backend, Int, Tensor},
};

use super::mine_hardest;
use crate::{
    distance::pairwise_distances,
    mask::{anchor_negative_mask, anchor_positive_mask},
    output::hinge,
};

/// Configuration for creating a [semi-hard batch triplet loss](BatchHardSemiLoss).
#[derive(Config, Debug)]
pub struct BatchHardSemiLossConfig {
    /// Margin between positive and negative distances, also the width of the
    /// semi-hard band. Default: 1.0
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances. Default: false
    #[config(default = false)]
    pub squared: bool,
}

impl BatchHardSemiLossConfig {
    /// Initialize [semi-hard batch triplet loss](BatchHardSemiLoss).
    pub fn init(&self) -> BatchHardSemiLoss {
        self.assertions();
        BatchHardSemiLoss {
            margin: self.margin,
            squared: self.squared,
        }
    }

    fn assertions(&self) {
        assert!(
            self.margin > 0.0,
            "Margin for BatchHardSemiLoss must be positive, got {}",
            self.margin
        );
    }
}

/// Batch-hard triplet loss with semi-hard negatives.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct BatchHardSemiLoss {
    /// Margin between positive and negative distances.
    pub margin: f64,
    /// Use squared Euclidean distances.
    pub squared: bool,
}

impl Default for BatchHardSemiLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for BatchHardSemiLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("margin", &self.margin)
            .add("squared", &self.squared)
            .optional()
    }
}

impl BatchHardSemiLoss {
    /// Create a new semi-hard loss with default configuration.
    pub fn new() -> Self {
        BatchHardSemiLossConfig::new().init()
    }

    /// Compute the mean semi-hard loss over all anchors.
    ///
    /// # Shapes
    ///
    /// - labels: `[N]`
    /// - embeddings: `[N, D]`
    /// - output: `[1]`
    pub fn forward<B: Backend>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        self.forward_no_reduction(labels, embeddings).mean()
    }

    /// Compute the semi-hard loss of every anchor.
    ///
    /// # Shapes
    ///
    /// - labels: `[N]`
    /// - embeddings: `[N, D]`
    /// - output: `[N]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let [n, _] = embeddings.dims();
        let distances = pairwise_distances(embeddings, self.squared);

        let pairs = mine_hardest(
            distances,
            anchor_positive_mask(labels.clone()).float(),
            anchor_negative_mask(labels).float(),
            Some(self.margin),
        );

        hinge(pairs.positive_dist, pairs.negative_dist, self.margin).reshape([n])
    }
}
