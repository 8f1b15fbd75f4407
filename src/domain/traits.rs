// ============================================================
// Layer 3 - Core Traits
// ============================================================
// The preprocessing use case only needs "something that yields
// rating rows". The CSV loader is the production source.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::RecResult;
use crate::domain::rating::RatingRecord;

// ─── RatingSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the raw rating rows.
///
/// Implementations:
///   - CsvRatingLoader      → reads a rating table from disk
pub trait RatingSource {
    /// Load every available rating row, unfiltered.
    fn load_ratings(&self) -> RecResult<Vec<RatingRecord>>;
}
