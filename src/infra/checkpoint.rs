// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores model weights with Burn's named MessagePack
// file recorder at full precision.
//
// Only the best epoch so far is kept: each time the validation
// loss beats every earlier epoch the checkpoint is overwritten.
// After the loop the trainer ALWAYS restores from here, so the
// exported embeddings come from the best epoch even when the
// last epoch was worse.
//
// File layout:
//   model_checkpoint/
//     best.mpk.gz       ← weights of the best epoch
//     best_epoch.json   ← which epoch that was
//
// NamedMpkGzFileRecorder<FullPrecisionSettings>:
//   - Serialises parameters to MessagePack, gzip compressed
//   - Keeps f32 weights as f32, so a restored checkpoint is
//     bit-identical to the epoch it was taken from
//   - Loading fails if the architecture doesn't match
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};

use crate::domain::error::{RecError, RecResult};
use crate::ml::model::RecommenderModel;

const BEST_FILE:       &str = "best";
const BEST_EPOCH_FILE: &str = "best_epoch.json";

type ModelRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Write a model record to `path` (the recorder appends `.mpk.gz`).
pub fn save_record<B: Backend>(model: &RecommenderModel<B>, path: &Path) -> RecResult<()> {
    ModelRecorder::new()
        .record(model.clone().into_record(), path.to_path_buf())
        .map_err(|e| RecError::artifact(path, format!("cannot record model: {e:?}")))?;
    tracing::debug!("Saved model record to '{}'", path.display());
    Ok(())
}

/// Load a record written by `save_record` into `model`.
/// The model must have the architecture the record was saved from.
pub fn load_record<B: Backend>(
    model:  RecommenderModel<B>,
    path:   &Path,
    device: &B::Device,
) -> RecResult<RecommenderModel<B>> {
    let record = ModelRecorder::new()
        .load(path.to_path_buf(), device)
        .map_err(|e| RecError::artifact(path, format!("cannot load model record: {e:?}")))?;
    Ok(model.load_record(record))
}

/// Manages the best-so-far checkpoint of one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> RecResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| RecError::artifact(&dir, e))?;
        Ok(Self { dir })
    }

    /// Overwrite the checkpoint with `model`, remembering `epoch`.
    pub fn save_best<B: Backend>(&self, model: &RecommenderModel<B>, epoch: usize) -> RecResult<()> {
        save_record(model, &self.dir.join(BEST_FILE))?;

        let epoch_path = self.dir.join(BEST_EPOCH_FILE);
        let json = serde_json::to_string(&epoch).map_err(|e| RecError::artifact(&epoch_path, e))?;
        fs::write(&epoch_path, json).map_err(|e| RecError::artifact(&epoch_path, e))?;

        tracing::debug!("Checkpointed epoch {}", epoch);
        Ok(())
    }

    /// Restore the best weights into `model`.
    pub fn load_best<B: Backend>(
        &self,
        model:  RecommenderModel<B>,
        device: &B::Device,
    ) -> RecResult<RecommenderModel<B>> {
        let epoch = self.best_epoch()?;
        tracing::info!("Restoring best checkpoint from epoch {}", epoch);
        load_record(model, &self.dir.join(BEST_FILE), device)
    }

    /// Which epoch the checkpoint holds.
    /// Fails if no epoch has been checkpointed yet.
    pub fn best_epoch(&self) -> RecResult<usize> {
        let path = self.dir.join(BEST_EPOCH_FILE);
        let s = fs::read_to_string(&path).map_err(|e| RecError::artifact(&path, e))?;
        serde_json::from_str::<usize>(&s).map_err(|e| RecError::artifact(&path, e))
    }
}
