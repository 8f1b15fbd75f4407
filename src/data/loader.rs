// ============================================================
// Layer 4 - Rating Loader
// ============================================================
// Reads the raw rating table and drops low-activity users.
//
// Expected columns (extra columns are ignored):
//   user_id, item_id, rating
// `anime_id` is accepted in place of `item_id`, which is how the
// upstream ingestion names the item column.
//
// User activity is counted over the WHOLE loaded table before
// anything is dropped, so the threshold applies to a user's
// global rating count and not to a sample of it.
//
// Reference: csv crate documentation (serde deserialisation)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::{RatingRecord, RawId};
use crate::domain::traits::RatingSource;

/// Users with fewer ratings than this are dropped by default.
pub const DEFAULT_MIN_USER_RATINGS: usize = 400;

const USER_COLUMN:   &str = "user_id";
const ITEM_COLUMNS:  [&str; 2] = ["item_id", "anime_id"];
const RATING_COLUMN: &str = "rating";

#[derive(Debug, Deserialize)]
struct RatingRow {
    user_id: RawId,
    #[serde(alias = "anime_id")]
    item_id: RawId,
    rating:  f64,
}

/// Loads rating rows from a CSV file.
/// Implements the RatingSource trait from Layer 3.
pub struct CsvRatingLoader {
    path:     PathBuf,
    /// Only the first `max_rows` data rows are read when set
    max_rows: Option<usize>,
}

impl CsvRatingLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), max_rows: None }
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }
}

impl RatingSource for CsvRatingLoader {
    fn load_ratings(&self) -> RecResult<Vec<RatingRecord>> {
        let shown = self.path.display();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| RecError::data_load_caused(format!("cannot open '{shown}'"), e))?;

        let headers = reader
            .headers()
            .map_err(|e| RecError::data_load_caused(format!("cannot read header of '{shown}'"), e))?
            .clone();
        check_columns(&headers, &self.path)?;

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<RatingRow>().enumerate() {
            if self.max_rows.is_some_and(|max| index >= max) {
                tracing::info!("Row cap of {} reached, ignoring the rest of '{}'", index, shown);
                break;
            }

            // +2: one for the header, one because lines are 1-based
            let row = row.map_err(|e| {
                RecError::data_load_caused(format!("malformed row at line {} of '{shown}'", index + 2), e)
            })?;

            if !row.rating.is_finite() {
                return Err(RecError::data_load(format!(
                    "non-finite rating at line {} of '{shown}'",
                    index + 2
                )));
            }

            records.push(RatingRecord::new(row.user_id, row.item_id, row.rating));
        }

        tracing::info!("Loaded {} rating rows from '{}'", records.len(), shown);
        Ok(records)
    }
}

/// Fail early with a readable message instead of a per-row serde error.
fn check_columns(headers: &csv::StringRecord, path: &Path) -> RecResult<()> {
    let has = |name: &str| headers.iter().any(|h| h == name);

    let mut missing = Vec::new();
    if !has(USER_COLUMN) {
        missing.push(USER_COLUMN.to_string());
    }
    if !ITEM_COLUMNS.iter().any(|c| has(c)) {
        missing.push(ITEM_COLUMNS.join("|"));
    }
    if !has(RATING_COLUMN) {
        missing.push(RATING_COLUMN.to_string());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RecError::data_load(format!(
            "'{}' is missing required column(s): {}",
            path.display(),
            missing.join(", ")
        )))
    }
}

/// Keep only the rows of users with at least `min_ratings` ratings.
/// Row order is preserved.
pub fn filter_users(records: Vec<RatingRecord>, min_ratings: usize) -> Vec<RatingRecord> {
    let mut counts: HashMap<RawId, usize> = HashMap::new();
    for r in &records {
        *counts.entry(r.user_id).or_default() += 1;
    }

    let before = records.len();
    let kept: Vec<RatingRecord> = records
        .into_iter()
        .filter(|r| counts[&r.user_id] >= min_ratings)
        .collect();

    let active_users = counts.values().filter(|&&c| c >= min_ratings).count();
    tracing::info!(
        "Filtered users with < {} ratings: kept {} of {} rows ({} of {} users)",
        min_ratings,
        kept.len(),
        before,
        active_users,
        counts.len(),
    );

    kept
}
