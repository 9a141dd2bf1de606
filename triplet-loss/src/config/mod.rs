//! Configuration module for the triplet losses.
//!
//! - `core`: the [`TripletLossConfig`] front-end configuration
//! - `enums`: strategy, negative selection and class set enumerations

pub mod core;
pub mod enums;

pub use core::TripletLossConfig;
pub use enums::{ClassSet, MiningStrategy, NegativeSelection};
