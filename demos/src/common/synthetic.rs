//! Synthetic clustered embeddings.

use burn::prelude::*;
use rand::Rng;

use crate::config::SyntheticBatchConfig;

/// Draw one random center per class in `[-1, 1)^dim` and scatter the samples
/// uniformly around them.
///
/// Sample `i` gets label `i % num_classes`.
///
/// # Shapes
/// - labels: `[batch_size]`
/// - embeddings: `[batch_size, dim]`
pub fn clustered_batch<B: Backend, R: Rng + ?Sized>(
    config: &SyntheticBatchConfig,
    rng: &mut R,
    device: &B::Device,
) -> (Tensor<B, 1, Int>, Tensor<B, 2>) {
    let SyntheticBatchConfig {
        batch_size,
        num_classes,
        dim,
        spread,
        ..
    } = *config;
    let num_classes = num_classes.max(1);

    let centers = (0..num_classes * dim)
        .map(|_| rng.gen_range(-1.0f32..1.0))
        .collect::<Vec<_>>();

    let labels = (0..batch_size)
        .map(|i| (i % num_classes) as i64)
        .collect::<Vec<_>>();
    let embeddings = labels
        .iter()
        .flat_map(|&label| {
            let offset = label as usize * dim;
            centers[offset..offset + dim].to_vec()
        })
        .map(|center| {
            if spread > 0.0 {
                center + rng.gen_range(-spread..spread)
            } else {
                center
            }
        })
        .collect::<Vec<_>>();

    (
        Tensor::from_data(TensorData::new(labels, [batch_size]), device),
        Tensor::from_data(
            TensorData::new(embeddings, [batch_size, dim]).convert::<B::FloatElem>(),
            device,
        ),
    )
}
