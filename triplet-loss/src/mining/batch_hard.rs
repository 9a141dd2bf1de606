//! Batch-hard triplet loss.
//!
//! For every anchor the farthest positive and the closest negative form a
//! single triplet:
//!
//! ```text
//! l_a = relu(max_p d(a, p) - min_n d(a, n) + margin)
//! L   = mean_a(l_a)
//! ```
//!
//! Invalid negatives are excluded from the minimum by adding the row maximum
//! to them, see [`masked_min_dim`](burn_extra_ops::masked_min_dim).

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

/// Configuration for creating a [batch-hard triplet loss](BatchHardLoss).
#[derive(Config, Debug)]
pub struct BatchHardLossConfig {
    /// Margin between positive and negative distances. Default: 1.0
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances. Default: false
    #[config(default = false)]
    pub squared: bool,
}

impl BatchHardLossConfig {
    /// Initialize [batch-hard triplet loss](BatchHardLoss).
    pub fn init(&self) -> BatchHardLoss {
        self.assertions();
        BatchHardLoss {
            margin: self.margin,
            squared: self.squared,
        }
    }

    fn assertions(&self) {
        assert!(
            self.margin > 0.0,
            "Margin for BatchHardLoss must be positive, got {}",
            self.margin
        );
    }
}

/// Batch-hard triplet loss.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct BatchHardLoss {
    /// Margin between positive and negative distances.
    pub margin: f64,
    /// Use squared Euclidean distances.
    pub squared: bool,
}

impl Default for BatchHardLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for BatchHardLoss {
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

impl BatchHardLoss {
    /// Create a new batch-hard loss with default configuration.
    pub fn new() -> Self {
        BatchHardLossConfig::new().init()
    }

    /// Compute the mean batch-hard loss over all anchors.
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

    /// Compute the batch-hard loss of every anchor.
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
            None,
        );

        hinge(pairs.positive_dist, pairs.negative_dist, self.margin).reshape([n])
    }
}
