// ============================================================
// Layer 6 - Artifact Store
// ============================================================
// Everything one pipeline run writes lives under a single root:
//
//   artifacts/
//     processed/
//       user2user_encoded.json   ← raw user id → encoded id
//       user2user_decoded.json   ← encoded id → raw user id
//       item2item_encoded.json
//       item2item_decoded.json
//       x_train.mpk  x_test.mpk  ← (user, item) feature columns
//       y_train.mpk  y_test.mpk  ← normalised targets
//       rating_scaler.json       ← min/max the targets were scaled with
//       data_rating.csv          ← the encoded rating table
//       data_catalog.csv         ← optional, score-sorted catalog
//       data_synopsis.csv        ← optional
//     model/
//       model.mpk.gz             ← trained weights (Burn record)
//       model_config.json        ← architecture, to rebuild the model
//       metrics.csv  history.json
//     model_checkpoint/          ← see checkpoint.rs
//     weights/
//       user_weights.mpk         ← L2-normalised embedding tables
//       item_weights.mpk
//
// Mapping tables are JSON so they can be read by anything. Splits
// and weights are MessagePack, which is compact for long numeric
// arrays. Every failure names the file it was touching.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use burn::prelude::Backend;
use ndarray::Array2;
use serde::{de::DeserializeOwned, Serialize};

use crate::data::normalizer::MinMaxScaler;
use crate::domain::{
    catalog::{CatalogEntry, SynopsisEntry},
    encoding::{EncodingMap, IdMapping},
    error::{RecError, RecResult},
    rating::{EncodedId, EncodedRating, FeatureColumns, RawId, TrainTestSplit},
};
use crate::ml::{
    model::{RecommenderConfig, RecommenderModel},
    weights::EmbeddingWeights,
};
use crate::infra::checkpoint;

pub const DEFAULT_ARTIFACT_ROOT: &str = "artifacts";

const PROCESSED_DIR:  &str = "processed";
const MODEL_DIR:      &str = "model";
const CHECKPOINT_DIR: &str = "model_checkpoint";
const WEIGHTS_DIR:    &str = "weights";

// ─── Generic file helpers ────────────────────────────────────────────────────

fn ensure_parent(path: &Path) -> RecResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RecError::artifact(parent, e))?;
    }
    Ok(())
}

pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> RecResult<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| RecError::artifact(path, e))?;
    fs::write(path, json).map_err(|e| RecError::artifact(path, e))
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> RecResult<T> {
    let text = fs::read_to_string(path).map_err(|e| RecError::artifact(path, e))?;
    serde_json::from_str(&text).map_err(|e| RecError::artifact(path, e))
}

pub fn save_msgpack<T: Serialize + ?Sized>(path: &Path, value: &T) -> RecResult<()> {
    ensure_parent(path)?;
    let bytes = rmp_serde::to_vec_named(value).map_err(|e| RecError::artifact(path, e))?;
    fs::write(path, bytes).map_err(|e| RecError::artifact(path, e))
}

pub fn load_msgpack<T: DeserializeOwned>(path: &Path) -> RecResult<T> {
    let bytes = fs::read(path).map_err(|e| RecError::artifact(path, e))?;
    rmp_serde::from_slice(&bytes).map_err(|e| RecError::artifact(path, e))
}

/// Write `rows` as a headed CSV table.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> RecResult<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| RecError::artifact(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| RecError::artifact(path, e))?;
    }
    writer.flush().map_err(|e| RecError::artifact(path, e))
}

// ─── ArtifactStore ───────────────────────────────────────────────────────────

/// Typed access to the files of one artifact root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_ROOT)
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join(MODEL_DIR)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join(CHECKPOINT_DIR)
    }

    pub fn weights_dir(&self) -> PathBuf {
        self.root.join(WEIGHTS_DIR)
    }

    fn processed(&self, file: &str) -> PathBuf {
        self.processed_dir().join(file)
    }

    /// Model record path without extension; the recorder adds `.mpk.gz`.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join("model")
    }

    pub fn model_config_path(&self) -> PathBuf {
        self.model_dir().join("model_config.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.model_dir().join("history.json")
    }

    pub fn user_weights_path(&self) -> PathBuf {
        self.weights_dir().join("user_weights.mpk")
    }

    pub fn item_weights_path(&self) -> PathBuf {
        self.weights_dir().join("item_weights.mpk")
    }

    // ── Encoding tables ──────────────────────────────────────────────────────

    pub fn save_encoding(&self, encoding: &EncodingMap) -> RecResult<()> {
        self.save_mapping("user2user", &encoding.users)?;
        self.save_mapping("item2item", &encoding.items)?;
        tracing::info!(
            "Saved id mappings: {} users, {} items",
            encoding.num_users(),
            encoding.num_items(),
        );
        Ok(())
    }

    pub fn load_encoding(&self) -> RecResult<EncodingMap> {
        Ok(EncodingMap::new(
            self.load_mapping("user2user")?,
            self.load_mapping("item2item")?,
        ))
    }

    fn save_mapping(&self, prefix: &str, mapping: &IdMapping) -> RecResult<()> {
        save_json(&self.processed(&format!("{prefix}_encoded.json")), &mapping.encoded_table())?;
        save_json(&self.processed(&format!("{prefix}_decoded.json")), &mapping.decoded_table())
    }

    fn load_mapping(&self, prefix: &str) -> RecResult<IdMapping> {
        let encoded: BTreeMap<RawId, EncodedId> =
            load_json(&self.processed(&format!("{prefix}_encoded.json")))?;
        let decoded: BTreeMap<EncodedId, RawId> =
            load_json(&self.processed(&format!("{prefix}_decoded.json")))?;
        IdMapping::from_tables(&encoded, &decoded)
    }

    // ── Train / test split ───────────────────────────────────────────────────

    pub fn save_split(&self, split: &TrainTestSplit) -> RecResult<()> {
        save_msgpack(&self.processed("x_train.mpk"), &split.x_train)?;
        save_msgpack(&self.processed("x_test.mpk"), &split.x_test)?;
        save_msgpack(&self.processed("y_train.mpk"), &split.y_train)?;
        save_msgpack(&self.processed("y_test.mpk"), &split.y_test)?;
        tracing::info!("Saved split: {} train rows, {} test rows", split.train_len(), split.test_len());
        Ok(())
    }

    pub fn load_split(&self) -> RecResult<TrainTestSplit> {
        let x_train: FeatureColumns = load_msgpack(&self.processed("x_train.mpk"))?;
        let x_test:  FeatureColumns = load_msgpack(&self.processed("x_test.mpk"))?;
        let y_train: Vec<f64>       = load_msgpack(&self.processed("y_train.mpk"))?;
        let y_test:  Vec<f64>       = load_msgpack(&self.processed("y_test.mpk"))?;

        if x_train.len() != y_train.len() || x_test.len() != y_test.len() {
            return Err(RecError::data_load(format!(
                "split columns disagree: x_train={} y_train={} x_test={} y_test={}",
                x_train.len(),
                y_train.len(),
                x_test.len(),
                y_test.len(),
            )));
        }

        Ok(TrainTestSplit { x_train, x_test, y_train, y_test })
    }

    // ── Processed tables ─────────────────────────────────────────────────────

    pub fn save_scaler(&self, scaler: &MinMaxScaler) -> RecResult<()> {
        save_json(&self.processed("rating_scaler.json"), scaler)
    }

    #[allow(dead_code)]
    pub fn load_scaler(&self) -> RecResult<MinMaxScaler> {
        let scaler: MinMaxScaler = load_json(&self.processed("rating_scaler.json"))?;
        // re-check the range of a hand-edited file
        MinMaxScaler::new(scaler.min, scaler.max)
    }

    pub fn save_rating_table(&self, rows: &[EncodedRating]) -> RecResult<()> {
        write_csv(&self.processed("data_rating.csv"), rows)
    }

    pub fn save_catalog(&self, entries: &[CatalogEntry]) -> RecResult<()> {
        write_csv(&self.processed("data_catalog.csv"), entries)
    }

    pub fn save_synopses(&self, entries: &[SynopsisEntry]) -> RecResult<()> {
        write_csv(&self.processed("data_synopsis.csv"), entries)
    }

    // ── Model and weights ────────────────────────────────────────────────────

    pub fn save_model_config(&self, config: &RecommenderConfig) -> RecResult<()> {
        save_json(&self.model_config_path(), config)
    }

    pub fn load_model_config(&self) -> RecResult<RecommenderConfig> {
        load_json(&self.model_config_path())
    }

    /// Persist the trained model: record plus the config to rebuild it.
    pub fn save_model<B: Backend>(
        &self,
        model:  &RecommenderModel<B>,
        config: &RecommenderConfig,
    ) -> RecResult<()> {
        let path = self.model_path();
        ensure_parent(&path)?;
        checkpoint::save_record(model, &path)?;
        self.save_model_config(config)?;
        tracing::info!("Saved model to '{}'", self.model_dir().display());
        Ok(())
    }

    /// Rebuild the saved architecture and load its weights.
    #[allow(dead_code)]
    pub fn load_model<B: Backend>(&self, device: &B::Device) -> RecResult<RecommenderModel<B>> {
        let config = self.load_model_config()?;
        let model  = config.init::<B>(device)?;
        checkpoint::load_record(model, &self.model_path(), device)
    }

    pub fn save_weights(&self, weights: &EmbeddingWeights) -> RecResult<()> {
        save_msgpack(&self.user_weights_path(), &weights.user)?;
        save_msgpack(&self.item_weights_path(), &weights.item)?;
        tracing::info!("Saved embedding weights to '{}'", self.weights_dir().display());
        Ok(())
    }

    #[allow(dead_code)]
    pub fn load_weights(&self) -> RecResult<EmbeddingWeights> {
        let user: Array2<f32> = load_msgpack(&self.user_weights_path())?;
        let item: Array2<f32> = load_msgpack(&self.item_weights_path())?;
        Ok(EmbeddingWeights { user, item })
    }
}
