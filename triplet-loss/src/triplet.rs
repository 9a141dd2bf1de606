//! Configurable front-end dispatching to one mining strategy.

use burn::prelude::*;

use crate::{
    config::{MiningStrategy, NegativeSelection, TripletLossConfig},
    error::{TripletLossError, TripletLossResult},
    mining::{
        BatchAdaptedLoss, BatchAdaptedLossConfig, BatchAllLoss, BatchAllLossConfig,
        BatchAllPositiveSemiLoss, BatchAllPositiveSemiLossConfig, BatchHardLoss,
        BatchHardLossConfig, BatchHardSemiAdaptedLoss, BatchHardSemiAdaptedLossConfig,
        BatchHardSemiLoss, BatchHardSemiLossConfig,
    },
    output::TripletLossOutput,
    perturbation::PerturbationSource,
};

#[derive(Clone, Debug)]
enum TripletMiner {
    BatchHard(BatchHardLoss),
    BatchHardSemi(BatchHardSemiLoss),
    BatchAllPositiveSemi(BatchAllPositiveSemiLoss),
    BatchHardSemiAdapted(BatchHardSemiAdaptedLoss),
    BatchAdapted(BatchAdaptedLoss),
    BatchAll(BatchAllLoss),
}

/// Triplet loss with the mining strategy chosen at configuration time.
#[derive(Clone, Debug)]
pub struct TripletLoss {
    strategy: MiningStrategy,
    miner: TripletMiner,
}

impl TripletLossConfig {
    /// Validate the configuration and build the loss.
    ///
    /// # Errors
    ///
    /// Returns [`TripletLossError::InvalidConfiguration`] when
    /// [`validate`](Self::validate) fails.
    pub fn init(&self) -> TripletLossResult<TripletLoss> {
        self.validate()?;

        let miner = match self.strategy {
            MiningStrategy::BatchHard | MiningStrategy::BatchFirst => TripletMiner::BatchHard(
                BatchHardLossConfig::new()
                    .with_margin(self.margin)
                    .with_squared(self.squared)
                    .init(),
            ),
            MiningStrategy::BatchHardSemi => TripletMiner::BatchHardSemi(
                BatchHardSemiLossConfig::new()
                    .with_margin(self.margin)
                    .with_squared(self.squared)
                    .init(),
            ),
            MiningStrategy::BatchAllPositiveSemi => TripletMiner::BatchAllPositiveSemi(
                BatchAllPositiveSemiLossConfig::new()
                    .with_margin(self.margin)
                    .with_squared(self.squared)
                    .with_negative_selection(self.negative_selection.clone())
                    .init(),
            ),
            MiningStrategy::BatchHardSemiAdapted => TripletMiner::BatchHardSemiAdapted(
                BatchHardSemiAdaptedLossConfig::new()
                    .with_margin(self.margin)
                    .with_squared(self.squared)
                    .with_lambda(self.lambda)
                    .with_class_set(self.class_set.clone())
                    .init(),
            ),
            MiningStrategy::BatchAdapted => TripletMiner::BatchAdapted(
                BatchAdaptedLossConfig::new()
                    .with_margin(self.margin)
                    .with_squared(self.squared)
                    .with_lambda(self.lambda)
                    .with_class_set(self.class_set.clone())
                    .init(),
            ),
            MiningStrategy::BatchAll => TripletMiner::BatchAll(
                BatchAllLossConfig::new()
                    .with_margin(self.margin)
                    .with_squared(self.squared)
                    .init(),
            ),
        };

        if self.strategy == MiningStrategy::BatchAllPositiveSemi
            && self.negative_selection == NegativeSelection::Nearest
        {
            tracing::debug!("batch-all-positive-semi picks the nearest in-band negative");
        }

        Ok(TripletLoss {
            strategy: self.strategy.clone(),
            miner,
        })
    }
}

impl TripletLoss {
    /// The configured mining strategy.
    pub const fn strategy(&self) -> &MiningStrategy {
        &self.strategy
    }

    /// Compute the loss. Batch-adapted mining draws its weights from the
    /// thread-local generator.
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
        self.forward_with_rng(labels, embeddings, &mut rand::thread_rng())
    }

    /// Compute the loss, drawing batch-adapted weights from `perturbation`.
    ///
    /// The other strategies ignore `perturbation`.
    pub fn forward_with_rng<B: Backend, P: PerturbationSource + ?Sized>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
        perturbation: &mut P,
    ) -> TripletLossOutput<B> {
        let [batch_size, dim] = embeddings.dims();
        tracing::debug!(
            strategy = self.strategy.name(),
            batch_size,
            dim,
            "computing triplet loss"
        );

        match &self.miner {
            TripletMiner::BatchHard(loss) => {
                TripletLossOutput::new(loss.forward(labels, embeddings))
            }
            TripletMiner::BatchHardSemi(loss) => {
                TripletLossOutput::new(loss.forward(labels, embeddings))
            }
            TripletMiner::BatchAllPositiveSemi(loss) => {
                TripletLossOutput::new(loss.forward(labels, embeddings))
            }
            TripletMiner::BatchHardSemiAdapted(loss) => loss.forward(labels, embeddings),
            TripletMiner::BatchAdapted(loss) => loss.forward(labels, embeddings, perturbation),
            TripletMiner::BatchAll(loss) => loss.forward(labels, embeddings),
        }
    }

    /// [`forward`](Self::forward) after [`check_inputs`](Self::check_inputs).
    ///
    /// # Errors
    ///
    /// Returns the error reported by [`check_inputs`](Self::check_inputs).
    pub fn try_forward<B: Backend>(
        &self,
        labels: Tensor<B, 1, Int>,
        embeddings: Tensor<B, 2>,
    ) -> TripletLossResult<TripletLossOutput<B>> {
        Self::check_inputs(&labels, &embeddings)?;
        Ok(self.forward(labels, embeddings))
    }

    /// Check that the batch is non-empty and that labels and embeddings agree.
    ///
    /// # Errors
    ///
    /// - [`TripletLossError::EmptyBatch`] when there are no embeddings.
    /// - [`TripletLossError::InvalidTensorShape`] when the embeddings have no
    ///   features or the label count differs from the batch size.
    pub fn check_inputs<B: Backend>(
        labels: &Tensor<B, 1, Int>,
        embeddings: &Tensor<B, 2>,
    ) -> TripletLossResult<()> {
        let [batch_size, dim] = embeddings.dims();
        if batch_size == 0 {
            return Err(TripletLossError::EmptyBatch);
        }

        if dim == 0 {
            return Err(TripletLossError::InvalidTensorShape {
                expected: format!("[{batch_size}, D] with D >= 1"),
                actual: format!("{:?}", embeddings.dims()),
            });
        }

        let [label_count] = labels.dims();
        if label_count != batch_size {
            return Err(TripletLossError::InvalidTensorShape {
                expected: format!("[{batch_size}]"),
                actual: format!("{:?}", labels.dims()),
            });
        }

        Ok(())
    }
}
