// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records one row per epoch to a CSV file and the whole run's
// history to JSON.
//
// Metric logging is best effort: the trainer logs a warning
// when a write fails and keeps training. Nothing in here may
// abort a run.
//
// Example CSV output:
//   epoch,learning_rate,train_loss,val_loss,val_mae,val_mse,improved
//   0,0.000010,0.693001,0.692870,0.249800,0.079100,true
//   1,0.000032,0.692700,0.692550,0.249600,0.079000,true
//
// Empty val_mae / val_mse cells mean the metric wasn't configured.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 0-based epoch index, the one the schedule was evaluated at
    pub epoch: usize,

    /// Learning rate used for every step of this epoch
    pub learning_rate: f64,

    /// Sample-weighted mean training loss
    pub train_loss: f64,

    /// Sample-weighted mean loss on the test split
    pub val_loss: f64,

    pub val_mae: Option<f64>,
    pub val_mse: Option<f64>,

    /// Whether this epoch was checkpointed as the new best
    pub improved: bool,
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh metrics file in `dir`, replacing an older run's.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)?;
        writeln!(f, "epoch,learning_rate,train_loss,val_loss,val_mae,val_mse,improved")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.9},{:.6},{:.6},{},{},{}",
            m.epoch,
            m.learning_rate,
            m.train_loss,
            m.val_loss,
            cell(m.val_mae),
            cell(m.val_mse),
            m.improved,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

/// Write the full epoch history as pretty JSON.
pub fn save_history(path: &Path, history: &[EpochMetrics]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(history)?)?;
    Ok(())
}
