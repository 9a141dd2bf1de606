//! Online triplet mining losses for Burn.
//!
//! Given a batch of integer labels `[N]` and embeddings `[N, D]`, every loss
//! builds the pairwise Euclidean distance matrix, derives which pairs and
//! triplets are valid from the labels, mines triplets and reduces their margin
//! hinge to a scalar loss `[1]` that can be backpropagated.
//!
//! The strategies live in [`mining`] and can be used directly, or through
//! [`TripletLoss`], which picks one from a [`TripletLossConfig`]:
//!
//! ```rust,ignore
//! use triplet_loss_burn::{MiningStrategy, TripletLossConfig};
//!
//! let loss = TripletLossConfig::new(MiningStrategy::BatchHardSemi)
//!     .with_margin(0.5)
//!     .init()?;
//! let output = loss.forward(labels, embeddings);
//! output.loss.backward();
//! ```

pub mod centroid;
mod config;
pub mod distance;
mod error;
pub mod mask;
pub mod mining;
pub mod output;
pub mod perturbation;
mod triplet;


pub use config::*;
pub use error::{TripletLossError, TripletLossResult};
pub use output::TripletLossOutput;
pub use perturbation::PerturbationSource;
pub use triplet::TripletLoss;
