// ============================================================
// Layer 4 - Rating Normaliser
// ============================================================
// Min-max scaling of the rating column into [0, 1]:
//
//   r' = (r - min) / (max - min)
//
// min and max are the GLOBAL extremes of the filtered table.
// They are fitted once, persisted with the other artifacts and
// reused for any rating scaled later. Refitting on new data
// would silently shift every target the model was trained on.

use serde::{Deserialize, Serialize};

use crate::domain::error::{RecError, RecResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    /// Build from known extremes. Requires `max > min`.
    pub fn new(min: f64, max: f64) -> RecResult<Self> {
        // also rejects NaN on either side
        if !(max > min) || !min.is_finite() || !max.is_finite() {
            return Err(RecError::DegenerateRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Fit on every rating of the table.
    pub fn fit<I>(ratings: I) -> RecResult<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let (min, max) = ratings
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r), hi.max(r)));

        let scaler = Self::new(min, max)?;
        tracing::info!("Fitted rating scaler: min={}, max={}", min, max);
        Ok(scaler)
    }

    pub fn transform(&self, rating: f64) -> f64 {
        (rating - self.min) / (self.max - self.min)
    }

    // Maps predictions back to the rating scale for consumers of the scaler.
    #[allow(dead_code)]
    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * (self.max - self.min) + self.min
    }
}
