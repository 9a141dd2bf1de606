//! Triplet loss demos
//!
//! Runs the mining strategies of `triplet-loss-burn` on synthetic clustered
//! embeddings and reports the loss together with the gradient it produces.
//!
//! ## Usage
//!
//! ```bash
//! # Batch-hard mining with the default batch
//! cargo run --bin mine
//!
//! # Every strategy on a larger batch
//! cargo run --bin mine -- --all --batch-size 64 --num-classes 8
//!
//! # Loss parameters from a saved configuration
//! cargo run --bin mine -- --config loss.json
//!
//! # GPU backend
//! cargo run --bin mine --features wgpu --no-default-features
//! ```

pub mod common;
pub mod config;

pub use common::{clustered_batch, create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use config::{MiningReport, SyntheticBatchConfig};
