//! Core configuration structure for the triplet loss front-end.

use crate::error::{TripletLossError, TripletLossResult};
use burn::prelude::*;

use super::enums::*;

/// Complete configuration of a [`TripletLoss`](crate::TripletLoss).
///
/// Fields that a strategy does not use are ignored: `lambda` and `class_set`
/// only matter for the adapted strategies, `negative_selection` only for
/// [`MiningStrategy::BatchAllPositiveSemi`].
#[derive(Config, Debug)]
pub struct TripletLossConfig {
    /// How triplets are mined from the batch.
    pub strategy: MiningStrategy,
    /// Margin between positive and negative distances.
    #[config(default = 1.0)]
    pub margin: f64,
    /// Use squared Euclidean distances.
    #[config(default = false)]
    pub squared: bool,
    /// Weight of the centroid alignment penalty.
    #[config(default = 1.0)]
    pub lambda: f64,
    /// Class identifiers enumerated by the centroid alignment penalty.
    #[config(default = "ClassSet::Range(8)")]
    pub class_set: ClassSet,
    /// Rule picking one negative out of the semi-hard band.
    #[config(default = "NegativeSelection::First")]
    pub negative_selection: NegativeSelection,
}

impl TripletLossConfig {
    /// Validates the configuration for logical consistency.
    ///
    /// # Errors
    ///
    /// Returns [`TripletLossError::InvalidConfiguration`] when the margin is not
    /// a positive finite number, `lambda` is negative or not finite, or the
    /// class set is an empty range.
    pub fn validate(&self) -> TripletLossResult<()> {
        if !(self.margin.is_finite() && self.margin > 0.0) {
            return Err(TripletLossError::InvalidConfiguration {
                reason: format!("Margin must be positive and finite, got {}", self.margin),
            });
        }

        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(TripletLossError::InvalidConfiguration {
                reason: format!(
                    "Lambda must be non-negative and finite, got {}",
                    self.lambda
                ),
            });
        }

        if self.class_set == ClassSet::Range(0) {
            return Err(TripletLossError::InvalidConfiguration {
                reason: "Class set range must contain at least one class".to_string(),
            });
        }

        Ok(())
    }
}
