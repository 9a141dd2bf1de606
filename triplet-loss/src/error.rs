use thiserror::Error;

/// The error type for `triplet-loss-burn` operations.
///
/// Loss kernels themselves never return errors; this type covers configuration
/// validation and the optional input checks performed by
/// [`TripletLoss::try_forward`](crate::TripletLoss::try_forward).
#[derive(Error, Debug, PartialEq)]
pub enum TripletLossError {
    /// Error for when a loss configuration is logically inconsistent.
    #[error("Invalid loss configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when the batch holds no embeddings.
    #[error("Embedding batch is empty")]
    EmptyBatch,
}

/// A specialized `Result` type for `triplet-loss-burn` operations.
pub type TripletLossResult<T> = Result<T, TripletLossError>;
