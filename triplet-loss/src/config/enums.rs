//! Enumeration types for triplet loss configuration.

use std::str::FromStr;

use burn::prelude::*;

use crate::error::TripletLossError;

/// Defines how triplets are mined from a batch.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum MiningStrategy {
    /// Farthest positive against closest negative for every anchor.
    BatchHard,
    /// Alias of [`MiningStrategy::BatchHard`] kept for configuration files
    /// that still use the old name.
    BatchFirst,
    /// Farthest positive against the closest semi-hard negative.
    BatchHardSemi,
    /// Every positive pair against one semi-hard negative.
    BatchAllPositiveSemi,
    /// Semi-hard mining plus the centroid alignment penalty.
    BatchHardSemiAdapted,
    /// Randomly reweighted hard mining plus the centroid alignment penalty.
    BatchAdapted,
    /// Every valid triplet, averaged over the active ones.
    BatchAll,
}

impl MiningStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::BatchHard,
        Self::BatchFirst,
        Self::BatchHardSemi,
        Self::BatchAllPositiveSemi,
        Self::BatchHardSemiAdapted,
        Self::BatchAdapted,
        Self::BatchAll,
    ];

    /// Snake-case name used on the command line and in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BatchHard => "batch_hard",
            Self::BatchFirst => "batch_first",
            Self::BatchHardSemi => "batch_hard_semi",
            Self::BatchAllPositiveSemi => "batch_all_positive_semi",
            Self::BatchHardSemiAdapted => "batch_hard_semi_adapted",
            Self::BatchAdapted => "batch_adapted",
            Self::BatchAll => "batch_all",
        }
    }

    /// Whether the strategy adds the centroid alignment penalty.
    #[must_use]
    pub const fn is_adapted(&self) -> bool {
        matches!(self, Self::BatchHardSemiAdapted | Self::BatchAdapted)
    }
}

impl FromStr for MiningStrategy {
    type Err = TripletLossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .ok_or_else(|| TripletLossError::InvalidConfiguration {
                reason: format!("Unknown mining strategy: {s}"),
            })
    }
}

/// Defines which semi-hard negative is paired with a positive when several
/// lie inside the band.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum NegativeSelection {
    /// The in-band negative with the lowest batch index.
    First,
    /// The in-band negative closest to the anchor.
    Nearest,
}

/// Defines the class identifiers enumerated by the centroid alignment penalty.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum ClassSet {
    /// Identifiers `0..k`.
    Range(usize),
    /// The distinct labels present in the batch.
    Present,
}

impl ClassSet {
    /// Resolve the class identifiers for a batch with the given labels.
    ///
    /// Identifiers are returned in ascending order.
    #[must_use]
    pub fn class_ids(&self, labels: &[i64]) -> Vec<i64> {
        match self {
            Self::Range(k) => (0..*k as i64).collect(),
            Self::Present => {
                let mut ids = labels.to_vec();
                ids.sort_unstable();
                ids.dedup();
                ids
            }
        }
    }
}
