// ============================================================
// Layer 3 - Rating Domain Types
// ============================================================
// A RatingRecord is one observed (user, item, rating) row as it
// arrives from the upstream rating table. An EncodedRating is
// the same row after the identifier encoder and the rating
// normaliser have run; it is what gets split and trained on.

use serde::{Deserialize, Serialize};

/// Raw identifier as it appears in the source tables.
pub type RawId = u64;

/// Dense identifier in `[0, N)` assigned by the encoder.
pub type EncodedId = u32;

/// One observed interaction. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: RawId,
    pub item_id: RawId,
    pub rating:  f64,
}

impl RatingRecord {
    pub fn new(user_id: RawId, item_id: RawId, rating: f64) -> Self {
        Self { user_id, item_id, rating }
    }
}

/// A rating row with its encoded ids and its min-max scaled rating.
/// This is also the row layout of the processed rating table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodedRating {
    pub user_id: RawId,
    pub item_id: RawId,
    /// Normalised to [0, 1]
    pub rating:  f64,
    pub user:    EncodedId,
    pub item:    EncodedId,
}

/// Column-wise features: one sequence per tower.
/// `users[i]` and `items[i]` describe the same row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumns {
    pub users: Vec<EncodedId>,
    pub items: Vec<EncodedId>,
}

impl FeatureColumns {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn push(&mut self, user: EncodedId, item: EncodedId) {
        self.users.push(user);
        self.items.push(item);
    }
}

/// Row-wise train/test partition of the encoded ratings.
///
/// A (user, item) pair that occurs twice in the source may end up
/// on both sides: rows are split, not pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub x_train: FeatureColumns,
    pub x_test:  FeatureColumns,
    pub y_train: Vec<f64>,
    pub y_test:  Vec<f64>,
}

impl TrainTestSplit {
    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}
