use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::rating::{EncodedId, FeatureColumns};

/// One (user, item) pair with its normalised rating target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSample {
    pub user:   EncodedId,
    pub item:   EncodedId,
    pub rating: f32,
}

pub struct RatingDataset {
    samples: Vec<RatingSample>,
}

impl RatingDataset {
    /// Zip the per-tower feature columns with their targets.
    pub fn from_columns(features: &FeatureColumns, targets: &[f64]) -> Self {
        let samples = features
            .users
            .iter()
            .zip(&features.items)
            .zip(targets)
            .map(|((&user, &item), &rating)| RatingSample { user, item, rating: rating as f32 })
            .collect();
        Self { samples }
    }
}

impl Dataset<RatingSample> for RatingDataset {
    fn get(&self, index: usize) -> Option<RatingSample> {
        self.samples.get(index).copied()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
