// ============================================================
// Layer 4 - Identifier Encoder
// ============================================================
// Builds the user and item bijections from the filtered rating
// rows and attaches the encoded ids to every row.
//
// The maps are built from the very rows they encode, so a row
// whose raw id has no encoding cannot occur. Running the encoder
// on a different slice of data produces different numbering;
// a model trained against one EncodingMap is useless with
// another.

use crate::domain::encoding::{EncodingMap, IdMapping};
use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::{EncodedRating, RatingRecord};
use crate::data::normalizer::MinMaxScaler;

/// Enumerate unique users and items in first-seen order.
pub fn build_encoding(records: &[RatingRecord]) -> EncodingMap {
    let users = IdMapping::from_first_seen(records.iter().map(|r| r.user_id));
    let items = IdMapping::from_first_seen(records.iter().map(|r| r.item_id));

    tracing::info!("Encoded {} users and {} items", users.len(), items.len());
    EncodingMap::new(users, items)
}

/// Attach encoded ids and the scaled rating to every row.
pub fn encode_ratings(
    records:  &[RatingRecord],
    encoding: &EncodingMap,
    scaler:   &MinMaxScaler,
) -> RecResult<Vec<EncodedRating>> {
    records
        .iter()
        .map(|r| {
            let user = encoding.users.encode(r.user_id).ok_or_else(|| {
                RecError::data_load(format!("user {} has no encoding", r.user_id))
            })?;
            let item = encoding.items.encode(r.item_id).ok_or_else(|| {
                RecError::data_load(format!("item {} has no encoding", r.item_id))
            })?;
            Ok(EncodedRating {
                user_id: r.user_id,
                item_id: r.item_id,
                rating:  scaler.transform(r.rating),
                user,
                item,
            })
        })
        .collect()
}
