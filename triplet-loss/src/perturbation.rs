//! Random reweighting of the selection masks used by batch-adapted mining.
//!
//! The weights come from a caller-supplied [`PerturbationSource`], which keeps
//! the loss itself deterministic: pass a seeded [`StdRng`](rand::rngs::StdRng)
//! to reproduce a run.

use burn::prelude::*;
use rand::Rng;

/// Exclusive upper bound of the integer weights applied to positive pairs.
pub const POSITIVE_WEIGHT_BOUND: u32 = 10;

/// Source of the random mask weights.
pub trait PerturbationSource {
    /// `len` integer-valued weights in `0..POSITIVE_WEIGHT_BOUND`.
    fn positive_weights(&mut self, len: usize) -> Vec<f32>;

    /// `len` weights drawn uniformly from `[0, 1)`.
    fn negative_weights(&mut self, len: usize) -> Vec<f32>;
}

impl<R: Rng + ?Sized> PerturbationSource for R {
    fn positive_weights(&mut self, len: usize) -> Vec<f32> {
        (0..len)
            .map(|_| self.gen_range(0..POSITIVE_WEIGHT_BOUND) as f32)
            .collect()
    }

    fn negative_weights(&mut self, len: usize) -> Vec<f32> {
        (0..len).map(|_| self.gen::<f32>()).collect()
    }
}

/// Lay `n * n` row-major weights out as an `[n, n]` tensor.
pub(crate) fn weight_matrix<B: Backend>(
    weights: Vec<f32>,
    n: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::from_data(
        TensorData::new(weights, [n, n]).convert::<B::FloatElem>(),
        device,
    )
}
