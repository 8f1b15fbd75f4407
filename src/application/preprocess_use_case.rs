// ============================================================
// Layer 2 - PreprocessUseCase
// ============================================================
// Turns the raw rating table into training-ready artifacts:
//
//   Step 1: Load ratings (optionally capped)   (Layer 4 - data)
//   Step 2: Drop low-activity users            (Layer 4 - data)
//   Step 3: Fit the min-max scaler             (Layer 4 - data)
//   Step 4: Encode user / item ids             (Layer 4 - data)
//   Step 5: Seeded train / test split          (Layer 4 - data)
//   Step 6: Persist mappings, split, scaler,
//           and the encoded rating table       (Layer 6 - infra)
//   Step 7: Optional catalog / synopsis tables (Layer 4 → 6)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    catalog::{load_catalog, load_synopses},
    encoder::{build_encoding, encode_ratings},
    loader::{filter_users, CsvRatingLoader, DEFAULT_MIN_USER_RATINGS},
    normalizer::MinMaxScaler,
    splitter::{split_ratings, DEFAULT_SEED, DEFAULT_TEST_FRACTION},
};
use crate::domain::{
    encoding::EncodingMap,
    error::RecError,
    rating::TrainTestSplit,
    traits::RatingSource,
};
use crate::infra::artifacts::{ArtifactStore, DEFAULT_ARTIFACT_ROOT};

/// Rows read from the rating table when no cap is given on the CLI.
pub const DEFAULT_MAX_ROWS: usize = 5_000_000;

// ─── Preprocessing Configuration ─────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub ratings_csv:      PathBuf,
    pub catalog_csv:      Option<PathBuf>,
    pub synopsis_csv:     Option<PathBuf>,
    pub artifact_root:    PathBuf,
    pub min_user_ratings: usize,
    pub max_rows:         Option<usize>,
    pub test_fraction:    f64,
    pub seed:             u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            ratings_csv:      PathBuf::from("artifacts/raw/animelist.csv"),
            catalog_csv:      None,
            synopsis_csv:     None,
            artifact_root:    PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            min_user_ratings: DEFAULT_MIN_USER_RATINGS,
            max_rows:         Some(DEFAULT_MAX_ROWS),
            test_fraction:    DEFAULT_TEST_FRACTION,
            seed:             DEFAULT_SEED,
        }
    }
}

/// Counts reported back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessSummary {
    pub loaded_rows:   usize,
    pub kept_rows:     usize,
    pub num_users:     usize,
    pub num_items:     usize,
    pub train_rows:    usize,
    pub test_rows:     usize,
    pub scaler:        MinMaxScaler,
}

// ─── PreprocessUseCase ───────────────────────────────────────────────────────
pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Execute every preprocessing step, adding stage context to failures.
    pub fn execute(&self) -> Result<PreprocessSummary> {
        self.run_steps().context("preprocessing stage failed")
    }

    fn run_steps(&self) -> Result<PreprocessSummary> {
        let cfg   = &self.config;
        let store = ArtifactStore::new(&cfg.artifact_root);

        // ── Step 1: Load the rating table ────────────────────────────────────
        tracing::info!("Loading ratings from '{}'", cfg.ratings_csv.display());
        let loader  = CsvRatingLoader::new(&cfg.ratings_csv).with_max_rows(cfg.max_rows);
        let records = loader.load_ratings()?;
        let loaded_rows = records.len();
        tracing::info!("Loaded {} rating rows", loaded_rows);

        // ── Step 2: Keep only users with enough ratings ──────────────────────
        let records = filter_users(records, cfg.min_user_ratings);
        if records.is_empty() {
            return Err(RecError::data_load(format!(
                "no user has at least {} ratings",
                cfg.min_user_ratings
            ))
            .into());
        }
        tracing::info!(
            "Kept {} of {} rows (users with ≥ {} ratings)",
            records.len(),
            loaded_rows,
            cfg.min_user_ratings,
        );

        // ── Step 3-4: Scale ratings and encode ids ───────────────────────────
        let scaler   = MinMaxScaler::fit(records.iter().map(|r| r.rating))?;
        let encoding = build_encoding(&records);
        let encoded  = encode_ratings(&records, &encoding, &scaler)?;

        // ── Step 5: Seeded split ─────────────────────────────────────────────
        let split = split_ratings(&encoded, cfg.test_fraction, cfg.seed)?;

        // ── Step 6: Persist ──────────────────────────────────────────────────
        persist(&store, &encoding, &split, &scaler)?;
        store.save_rating_table(&encoded)?;

        // ── Step 7: Side tables ──────────────────────────────────────────────
        if let Some(path) = &cfg.catalog_csv {
            let catalog = load_catalog(path)?;
            store.save_catalog(&catalog)?;
            tracing::info!("Saved catalog with {} entries", catalog.len());
        }
        if let Some(path) = &cfg.synopsis_csv {
            let synopses = load_synopses(path)?;
            store.save_synopses(&synopses)?;
            tracing::info!("Saved {} synopses", synopses.len());
        }

        Ok(PreprocessSummary {
            loaded_rows,
            kept_rows:  encoded.len(),
            num_users:  encoding.num_users(),
            num_items:  encoding.num_items(),
            train_rows: split.train_len(),
            test_rows:  split.test_len(),
            scaler,
        })
    }
}

fn persist(
    store:    &ArtifactStore,
    encoding: &EncodingMap,
    split:    &TrainTestSplit,
    scaler:   &MinMaxScaler,
) -> Result<()> {
    store.save_encoding(encoding)?;
    store.save_split(split)?;
    store.save_scaler(scaler)?;
    Ok(())
}
