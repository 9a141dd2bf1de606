//! Triplet loss over every positive pair with one semi-hard negative each.
//!
//! Instead of keeping only the farthest positive, every valid `(a, p)` pair
//! forms its own triplet. Its negative is taken from the semi-hard band
//! `d(a, p) < d(a, n) < d(a, p) + margin`:
//!
//! - [`NegativeSelection::First`] takes the in-band negative with the lowest
//!   batch index, so the result depends on batch order;
//! - [`NegativeSelection::Nearest`] takes the closest in-band negative.
//!
//! When the band is empty the anchor's farthest valid negative is used. The
//! loss is the mean hinge over all `(a, p)` pairs.
//!
//! Memory is `O(N³)`: the band is evaluated for all `(a, p, n)` at once.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    tensor::{backend::Backend, Int, Tensor},
};
use burn_extra_ops::masked_min_dim;

use crate::{
    config::NegativeSelection,
    distance::pairwise_distances,
    mask::{anchor_negative_mask, anchor_positive_mask},
    output::{hinge, mean_over_selected},
};

/// Configuration for creating an [all-positive semi-hard triplet loss](BatchAllPositiveSemiLoss).
#[derive(Config, Debug)]
pub struct BatchAllPositiveSemiLossConfig {
    /// Margin between positive and negative distances. Default: 1.0
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances. Default: false
    #[config(default = false)]
    pub squared: bool,
    /// Rule picking one negative out of the semi-hard band. Default: first
    #[config(default = "NegativeSelection::First")]
    pub negative_selection: NegativeSelection,
}

impl BatchAllPositiveSemiLossConfig {
    /// Initialize [all-positive semi-hard triplet loss](BatchAllPositiveSemiLoss).
    pub fn init(&self) -> BatchAllPositiveSemiLoss {
        self.assertions();
        BatchAllPositiveSemiLoss {
            margin: self.margin,
            squared: self.squared,
            nearest_negative: self.negative_selection == NegativeSelection::Nearest,
        }
    }

    fn assertions(&self) {
        assert!(
            self.margin > 0.0,
            "Margin for BatchAllPositiveSemiLoss must be positive, got {}",
            self.margin
        );
    }
}

/// Triplet loss over every positive pair with one semi-hard negative each.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct BatchAllPositiveSemiLoss {
    /// Margin between positive and negative distances.
    pub margin: f64,
    /// Use squared Euclidean distances.
    pub squared: bool,
    /// Pick the closest in-band negative instead of the first one.
    pub nearest_negative: bool,
}

impl Default for BatchAllPositiveSemiLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for BatchAllPositiveSemiLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("margin", &self.margin)
            .add("squared", &self.squared)
            .add("nearest_negative", &self.nearest_negative)
            .optional()
    }
}

impl BatchAllPositiveSemiLoss {
    /// Create a new all-positive semi-hard loss with default configuration.
    pub fn new() -> Self {
        BatchAllPositiveSemiLossConfig::new().init()
    }

    /// Compute the mean loss over every valid anchor-positive pair.
    ///
    /// A batch without any positive pair yields zero.
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
        let positive_mask = anchor_positive_mask(labels.clone()).float();
        let losses = self.forward_no_reduction(labels, embeddings);

        mean_over_selected(losses, positive_mask)
    }

    /// Compute the loss of every `(anchor, positive)` pair.
    ///
    /// Entries that are not valid anchor-positive pairs are zero.
    ///
    /// # Shapes
    ///
    /// - labels: `[N]`
    /// - embeddings: `[N, D]`
    /// - output: `[N, N]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let distances = pairwise_distances(embeddings, self.squared);
        let positive_mask = anchor_positive_mask(labels.clone()).float();
        let negative_mask = anchor_negative_mask(labels).float();

        let positive_dist = distances.clone() * positive_mask.clone();
        let negative_dist = distances * negative_mask.clone();
        let selected_negative =
            self.select_negatives(positive_dist.clone(), negative_dist, negative_mask);

        hinge(positive_dist, selected_negative, self.margin) * positive_mask
    }

    /// Pick one negative distance for every `(a, p)` pair.
    ///
    /// # Shapes
    /// - positive_dist: `[N, N]`, indexed `[a, p]`
    /// - negative_dist: `[N, N]`, indexed `[a, n]`, zero where invalid
    /// - negative_mask: `[N, N]`
    /// - output: `[N, N]`, indexed `[a, p]`
    fn select_negatives<B: Backend>(
        &self,
        positive_dist: Tensor<B, 2>,
        negative_dist: Tensor<B, 2>,
        negative_mask: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [n, _] = positive_dist.dims();
        let shape = [n, n, n];
        let device = positive_dist.device();

        // [a, p, n]
        let pos = positive_dist.unsqueeze_dim::<3>(2).expand(shape);
        let neg = negative_dist.clone().unsqueeze_dim::<3>(1).expand(shape);
        let valid = negative_mask.unsqueeze_dim::<3>(1).expand(shape);

        let band = neg.clone().greater(pos.clone()).float()
            * neg.clone().lower(pos.add_scalar(self.margin)).float()
            * valid;

        let in_band = if self.nearest_negative {
            masked_min_dim(neg, band.clone(), 2)
        } else {
            // Descending weights n, n-1, ..., 1 make the argmax land on the
            // lowest in-band index.
            let order = Tensor::<B, 1, Int>::arange(0..n as i64, &device)
                .float()
                .neg()
                .add_scalar(n as f64)
                .reshape([1, 1, n])
                .expand(shape);
            let first = (band.clone() * order).argmax(2);
            neg.gather(2, first)
        };

        let has_candidate = band.sum_dim(2).greater_elem(0.0);
        let fallback = negative_dist
            .max_dim(1)
            .reshape([n, 1, 1])
            .expand([n, n, 1]);

        fallback.mask_where(has_candidate, in_band).reshape([n, n])
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::{ops::FloatElem, TensorData, Tolerance},
    };

    use super::*;

    type TestBackend = NdArray<f32>;
    type FT = FloatElem<TestBackend>;

    fn labels(values: &[i64]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len()]),
            &Default::default(),
        )
    }

    fn points(positions: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(
            TensorData::new(positions.to_vec(), [positions.len(), 1]),
            &Default::default(),
        )
    }

    // Anchor 0 has both negatives in its band: index 2 at 1.8 comes first,
    // index 3 at 1.2 is nearer. Every other pair falls back to its anchor's
    // farthest negative.
    fn order_sensitive_batch() -> (Tensor<TestBackend, 1, Int>, Tensor<TestBackend, 2>) {
        (labels(&[0, 0, 1, 1]), points(&[0.0, 1.0, 1.8, -1.2]))
    }

    #[test]
    fn first_selection_takes_lowest_index_in_band() {
        let (labels, embeddings) = order_sensitive_batch();
        let loss = BatchAllPositiveSemiLoss::new();

        let pairs = loss.forward_no_reduction(labels.clone(), embeddings.clone());
        let mean = loss.forward(labels, embeddings);

        pairs.into_data().assert_approx_eq::<FT>(
            &TensorData::from([
                [0.0, 0.2, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 2.2],
                [0.0, 0.0, 1.8, 0.0],
            ]),
            Tolerance::default(),
        );
        mean.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([1.05]), Tolerance::default());
    }

    #[test]
    fn nearest_selection_takes_closest_in_band() {
        let (labels, embeddings) = order_sensitive_batch();
        let loss = BatchAllPositiveSemiLossConfig::new()
            .with_negative_selection(NegativeSelection::Nearest)
            .init();

        let mean = loss.forward(labels, embeddings);

        mean.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([1.2]), Tolerance::default());
    }

    #[test]
    fn every_positive_of_an_anchor_contributes() {
        // Anchor 0 has two positives (1 and 2) and both are hinge-active.
        let loss = BatchAllPositiveSemiLossConfig::new().with_margin(2.0).init();

        let pairs = loss.forward_no_reduction(labels(&[0, 0, 0, 1]), points(&[0.0, 1.0, 2.0, 2.5]));
        let values = pairs.into_data().to_vec::<f32>().unwrap();

        // (0, 1): band (1, 3) holds 2.5 -> 1 - 2.5 + 2
        assert!((values[1] - 0.5).abs() < 1e-5);
        // (0, 2): band (2, 4) holds 2.5 -> 2 - 2.5 + 2
        assert!((values[2] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn duplicate_positives_count_in_the_mean() {
        // Pairs (0, 1) and (1, 0) sit at distance zero and contribute 0.
        // (0, 2), (1, 2): 2 - 2.5 + 1. (2, 0), (2, 1): fallback 0.5, 2 - 0.5 + 1.
        let loss = BatchAllPositiveSemiLoss::new();

        let mean = loss.forward(labels(&[0, 0, 0, 1]), points(&[0.0, 0.0, 2.0, 2.5]));

        // 6 / 6 pairs, not 6 / 4
        mean.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([1.0]), Tolerance::default());
    }

    #[test]
    fn batch_without_positive_pairs_yields_zero() {
        let loss = BatchAllPositiveSemiLoss::new();

        let mean = loss.forward(labels(&[0, 1, 2]), points(&[0.0, 1.0, 2.0]));

        mean.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([0.0]), Tolerance::default());
    }

    #[test]
    fn single_class_batch_is_finite() {
        let loss = BatchAllPositiveSemiLoss::new();

        let mean = loss.forward(labels(&[3, 3, 3]), points(&[0.0, 0.5, 2.0]));
        let value = mean.into_data().to_vec::<f32>().unwrap()[0];

        // No negatives: every pair falls back to a zero negative distance.
        assert!(value.is_finite());
        assert!((value - (0.5 + 2.0 + 0.5 + 1.5 + 2.0 + 1.5) / 6.0 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn gradient_reaches_embeddings() {
        let device = Default::default();
        let loss = BatchAllPositiveSemiLoss::new();
        let embeddings = Tensor::<Autodiff<TestBackend>, 2>::from_floats(
            [[0.0, 0.0], [1.0, 0.0], [1.5, 0.5], [-1.0, 0.3]],
            &device,
        )
        .require_grad();
        let labels = Tensor::<Autodiff<TestBackend>, 1, Int>::from_ints([0, 0, 1, 1], &device);

        let grads = loss.forward(labels, embeddings.clone()).backward();
        let grad = embeddings
            .grad(&grads)
            .expect("gradient is tracked")
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert!(grad.iter().all(|g| g.is_finite()));
        assert!(grad.iter().any(|g| *g != 0.0));
    }
}
