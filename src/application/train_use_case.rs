// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the training stage in order:
//
//   Step 1: Resolve loss / optimiser / metric names  (Layer 5 - ml)
//   Step 2: Load split + id mappings                 (Layer 6 - infra)
//   Step 3: Build the model from the cardinalities   (Layer 5 - ml)
//   Step 4: Run the training loop                    (Layer 5 - ml)
//   Step 5: Save model, config and history           (Layer 6 - infra)
//   Step 6: Extract + save normalised weights        (Layer 5 → 6)
//
// Reference: Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use serde::{Deserialize, Serialize};

use crate::data::splitter::DEFAULT_SEED;
use crate::domain::{
    encoding::EncodingMap,
    error::{RecError, RecResult},
    rating::{FeatureColumns, TrainTestSplit},
};
use crate::infra::{
    artifacts::{save_json, ArtifactStore, DEFAULT_ARTIFACT_ROOT},
    checkpoint::CheckpointManager,
    metrics::{save_history, MetricsLogger},
};
use crate::ml::{
    model::{ModelSpec, RecommenderConfig},
    schedule::{LrSchedule, DEFAULT_PATIENCE},
    trainer::{run_training, TrainDevice},
    weights::extract_weights,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// model as train_config.json so a run can be reproduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub artifact_root:  PathBuf,
    pub embedding_size: usize,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub loss:           String,
    pub optimizer:      String,
    pub metrics:        Vec<String>,
    pub schedule:       LrSchedule,
    pub patience:       usize,
    /// Base of the per-epoch shuffle seeds
    pub seed:           u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            artifact_root:  PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            embedding_size: 128,
            epochs:         13,
            batch_size:     10_000,
            loss:           "binary_crossentropy".to_string(),
            optimizer:      "adam".to_string(),
            metrics:        vec!["mae".to_string(), "mse".to_string()],
            schedule:       LrSchedule::default(),
            patience:       DEFAULT_PATIENCE,
            seed:           DEFAULT_SEED,
        }
    }
}

/// What the training stage reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub best_epoch:     usize,
    pub best_val_loss:  f64,
    pub epochs_run:     usize,
    pub stopped_early:  bool,
    /// Learning rate of every epoch that ran
    pub learning_rates: Vec<f64>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the training stage end to end.
    pub fn execute(&self) -> Result<TrainSummary> {
        self.run_steps().context("training stage failed")
    }

    fn run_steps(&self) -> Result<TrainSummary> {
        let cfg   = &self.config;
        let store = ArtifactStore::new(&cfg.artifact_root);

        // ── Step 1: Resolve names before touching any data ───────────────────
        let spec = ModelSpec::resolve(&cfg.loss, &cfg.optimizer, &cfg.metrics)?;
        cfg.schedule.validate()?;

        // ── Step 2: Load preprocessed artifacts ──────────────────────────────
        let split    = store.load_split()?;
        let encoding = store.load_encoding()?;
        check_ids_in_range(&split, &encoding)?;
        tracing::info!(
            "Loaded split ({} train / {} test) over {} users and {} items",
            split.train_len(),
            split.test_len(),
            encoding.num_users(),
            encoding.num_items(),
        );

        // ── Step 3: Build model ──────────────────────────────────────────────
        let device    = TrainDevice::default();
        let model_cfg = RecommenderConfig::new(encoding.num_users(), encoding.num_items())
            .with_embedding_size(cfg.embedding_size);
        let model = model_cfg.init(&device)?;
        tracing::info!(
            "Model ready: {}×{} user table, {}×{} item table",
            model_cfg.num_users,
            model_cfg.embedding_size,
            model_cfg.num_items,
            model_cfg.embedding_size,
        );

        // ── Step 4: Train ────────────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(store.checkpoint_dir())?;
        let metrics = MetricsLogger::new(store.model_dir())
            .map_err(|e| tracing::warn!("Metrics CSV disabled: {:#}", e))
            .ok();

        let outcome = run_training(cfg, &spec, model, &split, &ckpt_manager, metrics.as_ref(), &device)?;

        if let Err(e) = save_history(&store.history_path(), &outcome.history) {
            tracing::warn!("Could not save training history: {:#}", e);
        }

        // ── Step 5: Persist the frozen model ─────────────────────────────────
        let model = outcome.model.valid();
        store.save_model(&model, &model_cfg)?;
        save_json(&store.model_dir().join("train_config.json"), cfg)?;

        // ── Step 6: Export normalised embeddings ─────────────────────────────
        let weights = extract_weights(&model)?;
        store.save_weights(&weights)?;

        let best_val_loss = outcome
            .history
            .iter()
            .find(|m| m.epoch == outcome.best_epoch)
            .map(|m| m.val_loss)
            .unwrap_or(f64::NAN);

        Ok(TrainSummary {
            best_epoch:     outcome.best_epoch,
            best_val_loss,
            epochs_run:     outcome.history.len(),
            stopped_early:  outcome.stopped_early,
            learning_rates: outcome.history.iter().map(|m| m.learning_rate).collect(),
        })
    }
}

/// Every encoded id in the split must have a row in its table.
fn check_ids_in_range(split: &TrainTestSplit, encoding: &EncodingMap) -> RecResult<()> {
    let check = |cols: &FeatureColumns, side: &str| -> RecResult<()> {
        if let Some(u) = cols.users.iter().find(|&&u| u as usize >= encoding.num_users()) {
            return Err(RecError::data_load(format!(
                "{side} split references user {u}, but only {} users are encoded",
                encoding.num_users()
            )));
        }
        if let Some(i) = cols.items.iter().find(|&&i| i as usize >= encoding.num_items()) {
            return Err(RecError::data_load(format!(
                "{side} split references item {i}, but only {} items are encoded",
                encoding.num_items()
            )));
        }
        Ok(())
    };
    check(&split.x_train, "train")?;
    check(&split.x_test, "test")
}
