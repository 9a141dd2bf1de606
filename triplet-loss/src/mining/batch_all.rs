//! Batch-all triplet loss.
//!
//! Every valid triplet `(a, p, n)` contributes `relu(d(a, p) - d(a, n) + margin)`.
//! The sum is divided by the number of triplets with a strictly positive
//! loss, so easy triplets do not dilute the gradient.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    distance::pairwise_distances,
    mask::triplet_mask,
    output::{fraction, hinge, mean_over_active, TripletLossOutput},
};

/// Configuration for creating a [batch-all triplet loss](BatchAllLoss).
#[derive(Config, Debug)]
pub struct BatchAllLossConfig {
    /// Margin between positive and negative distances. Default: 1.0
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances. Default: false
    #[config(default = false)]
    pub squared: bool,
}

impl BatchAllLossConfig {
    /// Initialize [batch-all triplet loss](BatchAllLoss).
    pub fn init(&self) -> BatchAllLoss {
        self.assertions();
        BatchAllLoss {
            margin: self.margin,
            squared: self.squared,
        }
    }

    fn assertions(&self) {
        assert!(
            self.margin > 0.0,
            "Margin for BatchAllLoss must be positive, got {}",
            self.margin
        );
    }
}

/// Batch-all triplet loss.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct BatchAllLoss {
    /// Margin between positive and negative distances.
    pub margin: f64,
    /// Use squared Euclidean distances.
    pub squared: bool,
}

impl Default for BatchAllLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for BatchAllLoss {
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

impl BatchAllLoss {
    /// Create a new batch-all loss with default configuration.
    pub fn new() -> Self {
        BatchAllLossConfig::new().init()
    }

    /// Compute the loss averaged over the active triplets, together with the
    /// fraction of valid triplets that are active.
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
        let valid = triplet_mask(labels.clone()).float().sum();
        let losses = self.forward_no_reduction(labels, embeddings);
        let (loss, active) = mean_over_active(losses);

        TripletLossOutput::new(loss).with_fraction_positive(fraction(active, valid))
    }

    /// Compute the loss of every triplet, zero for invalid ones.
    ///
    /// `output[a, p, n]` is the loss of anchor `a`, positive `p` and negative `n`.
    ///
    /// # Shapes
    ///
    /// - labels: `[N]`
    /// - embeddings: `[N, D]`
    /// - output: `[N, N, N]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let [n, _] = embeddings.dims();
        let distances = pairwise_distances(embeddings, self.squared);

        let anchor_positive = distances.clone().reshape([n, n, 1]).expand([n, n, n]);
        let anchor_negative = distances.reshape([n, 1, n]).expand([n, n, n]);

        hinge(anchor_positive, anchor_negative, self.margin) * triplet_mask(labels).float()
    }
}
