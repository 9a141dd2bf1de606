//! Configuration and report types for the demo binaries.

use serde::{Deserialize, Serialize};

/// Shape of the synthetic batch fed to the losses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticBatchConfig {
    /// Number of embeddings in the batch.
    pub batch_size: usize,
    /// Number of distinct labels; samples are assigned round-robin.
    pub num_classes: usize,
    /// Embedding dimension.
    pub dim: usize,
    /// Half-width of the uniform noise around each class center.
    pub spread: f32,
    /// Seed for the class centers, the noise and batch-adapted weights.
    pub seed: u64,
}

impl Default for SyntheticBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            num_classes: 4,
            dim: 16,
            spread: 0.5,
            seed: 42,
        }
    }
}

/// Result of running one mining strategy on a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningReport {
    /// Strategy name.
    pub strategy: String,
    /// Scalar loss.
    pub loss: f32,
    /// L2 norm of the loss gradient with respect to the embeddings.
    pub gradient_norm: f32,
    /// Fraction of active triplets, batch-all only.
    pub fraction_positive: Option<f32>,
    /// Unweighted centroid alignment penalty, adapted strategies only.
    pub centroid_penalty: Option<f32>,
}
