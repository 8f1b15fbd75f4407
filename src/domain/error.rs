// ============================================================
// Layer 3 - Error Taxonomy
// ============================================================
// Every failure a pipeline stage can diagnose is one of these
// variants. Stages wrap the underlying cause (csv, io, serde,
// burn recorder) instead of swallowing it, and the application
// layer adds "which stage" context on top with anyhow.
//
// The only failures that never become a RecError are metric
// logging failures: those are logged with tracing::warn! and
// training carries on.
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Recoverable Errors with Result)

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by the wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type RecResult<T> = std::result::Result<T, RecError>;

#[derive(Debug, Error)]
pub enum RecError {
    /// Missing, unreadable or malformed source data
    #[error("data load failed: {message}")]
    DataLoad {
        message: String,
        #[source]
        source:  Option<BoxError>,
    },

    /// The rating column is constant, min-max scaling is undefined
    #[error("rating range is degenerate (min = {min}, max = {max})")]
    DegenerateRange { min: f64, max: f64 },

    /// Invalid table cardinalities or unresolvable model configuration
    #[error("model build failed: {0}")]
    ModelBuild(String),

    /// A hyperparameter or split setting outside its valid range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Anything that went wrong inside the epoch loop
    #[error("training failed at epoch {epoch}: {message}")]
    TrainingFailure {
        epoch:   usize,
        message: String,
        #[source]
        source:  Option<BoxError>,
    },

    /// An embedding row that cannot be L2-normalised
    #[error("embedding row {row} of table `{table}` has zero or non-finite norm")]
    ZeroNorm { table: String, row: usize },

    /// Reading or writing one artifact file failed
    #[error("artifact i/o failed for '{}'", path.display())]
    Artifact {
        path:   PathBuf,
        #[source]
        source: BoxError,
    },
}

impl RecError {
    pub fn data_load(message: impl Into<String>) -> Self {
        Self::DataLoad { message: message.into(), source: None }
    }

    pub fn data_load_caused(
        message: impl Into<String>,
        source:  impl Into<BoxError>,
    ) -> Self {
        Self::DataLoad { message: message.into(), source: Some(source.into()) }
    }

    pub fn training(epoch: usize, message: impl Into<String>) -> Self {
        Self::TrainingFailure { epoch, message: message.into(), source: None }
    }

    pub fn training_caused(
        epoch:   usize,
        message: impl Into<String>,
        source:  impl Into<BoxError>,
    ) -> Self {
        Self::TrainingFailure {
            epoch,
            message: message.into(),
            source:  Some(source.into()),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Artifact { path: path.into(), source: source.into() }
    }
}
