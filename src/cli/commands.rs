// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Three subcommands: `preprocess`, `train` and `run` (both).
//
// Flags shared by every stage (artifact root, seed) live in
// CommonArgs; the stage flags live in PreprocessOptions and
// TrainOptions so `run` can take all of them at once.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    preprocess_use_case::{PreprocessConfig, DEFAULT_MAX_ROWS},
    run_use_case::PipelineConfig,
    train_use_case::TrainConfig,
};
use crate::data::{
    loader::DEFAULT_MIN_USER_RATINGS,
    splitter::{DEFAULT_SEED, DEFAULT_TEST_FRACTION},
};
use crate::infra::artifacts::DEFAULT_ARTIFACT_ROOT;
use crate::ml::schedule::{LrSchedule, DEFAULT_PATIENCE};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, filter, normalise, encode and split the rating table
    Preprocess(PreprocessArgs),

    /// Train the embedding model on a preprocessed split and export weights
    Train(TrainArgs),

    /// Preprocess, then train, with one configuration
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Root directory every artifact is read from and written to
    #[arg(long, default_value = DEFAULT_ARTIFACT_ROOT)]
    pub artifact_root: PathBuf,

    /// Seed for the split and the per-epoch shuffles
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct PreprocessOptions {
    /// Rating table with user_id, item_id (or anime_id) and rating columns
    #[arg(long, default_value = "artifacts/raw/animelist.csv")]
    pub ratings_csv: PathBuf,

    /// Optional item catalog, written as processed/data_catalog.csv
    #[arg(long)]
    pub catalog_csv: Option<PathBuf>,

    /// Optional synopsis table, written as processed/data_synopsis.csv
    #[arg(long)]
    pub synopsis_csv: Option<PathBuf>,

    /// Users with fewer ratings are dropped
    #[arg(long, default_value_t = DEFAULT_MIN_USER_RATINGS)]
    pub min_user_ratings: usize,

    /// Read at most this many rating rows
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    /// Read the whole rating table, ignoring --max-rows
    #[arg(long)]
    pub all_rows: bool,

    /// Share of rows held out for validation, in [0, 1)
    #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
    pub test_fraction: f64,
}

#[derive(Args, Debug, Clone)]
pub struct TrainOptions {
    /// Width of the user and item embeddings
    #[arg(long, default_value_t = 128)]
    pub embedding_size: usize,

    #[arg(long, default_value_t = 13)]
    pub epochs: usize,

    #[arg(long, default_value_t = 10_000)]
    pub batch_size: usize,

    /// binary_crossentropy, mse or mae
    #[arg(long, default_value = "binary_crossentropy")]
    pub loss: String,

    /// adam or sgd
    #[arg(long, default_value = "adam")]
    pub optimizer: String,

    /// Comma separated validation metrics (mae, mse)
    #[arg(long, value_delimiter = ',', default_value = "mae,mse")]
    pub metrics: Vec<String>,

    /// Learning rate of epoch 0
    #[arg(long, default_value_t = LrSchedule::default().start_lr)]
    pub start_lr: f64,

    /// Learning rate at the end of warmup
    #[arg(long, default_value_t = LrSchedule::default().max_lr)]
    pub max_lr: f64,

    /// Floor the decay approaches
    #[arg(long, default_value_t = LrSchedule::default().min_lr)]
    pub min_lr: f64,

    #[arg(long, default_value_t = LrSchedule::default().ramp_epochs)]
    pub ramp_epochs: usize,

    #[arg(long, default_value_t = LrSchedule::default().sustain_epochs)]
    pub sustain_epochs: usize,

    /// Per-epoch decay factor, in (0, 1)
    #[arg(long, default_value_t = LrSchedule::default().exp_decay)]
    pub exp_decay: f64,

    /// Stop after this many epochs without a better validation loss
    #[arg(long, default_value_t = DEFAULT_PATIENCE)]
    pub patience: usize,
}

#[derive(Args, Debug)]
pub struct PreprocessArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub options: PreprocessOptions,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub options: TrainOptions,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub preprocess: PreprocessOptions,

    #[command(flatten)]
    pub train: TrainOptions,
}

// ─── Args → application config ───────────────────────────────────────────────
// The application layer never sees clap types.

fn preprocess_config(common: CommonArgs, o: PreprocessOptions) -> PreprocessConfig {
    PreprocessConfig {
        ratings_csv:      o.ratings_csv,
        catalog_csv:      o.catalog_csv,
        synopsis_csv:     o.synopsis_csv,
        artifact_root:    common.artifact_root,
        min_user_ratings: o.min_user_ratings,
        max_rows:         (!o.all_rows).then_some(o.max_rows),
        test_fraction:    o.test_fraction,
        seed:             common.seed,
    }
}

fn train_config(common: CommonArgs, o: TrainOptions) -> TrainConfig {
    TrainConfig {
        artifact_root:  common.artifact_root,
        embedding_size: o.embedding_size,
        epochs:         o.epochs,
        batch_size:     o.batch_size,
        loss:           o.loss,
        optimizer:      o.optimizer,
        metrics:        o.metrics,
        schedule: LrSchedule {
            start_lr:       o.start_lr,
            max_lr:         o.max_lr,
            min_lr:         o.min_lr,
            ramp_epochs:    o.ramp_epochs,
            sustain_epochs: o.sustain_epochs,
            exp_decay:      o.exp_decay,
        },
        patience:       o.patience,
        seed:           common.seed,
    }
}

impl From<PreprocessArgs> for PreprocessConfig {
    fn from(a: PreprocessArgs) -> Self {
        preprocess_config(a.common, a.options)
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        train_config(a.common, a.options)
    }
}

impl From<RunArgs> for PipelineConfig {
    fn from(a: RunArgs) -> Self {
        PipelineConfig {
            preprocess: preprocess_config(a.common.clone(), a.preprocess),
            train:      train_config(a.common, a.train),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_defaults_match_application_defaults() {
        let cli = Cli::try_parse_from(["rating-embeddings", "run"]).unwrap();
        let Commands::Run(args) = cli.command else { panic!("expected run") };

        let config: PipelineConfig = args.into();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_flags_reach_the_config() {
        let cli = Cli::try_parse_from([
            "rating-embeddings", "train",
            "--artifact-root", "/tmp/out",
            "--epochs", "3",
            "--metrics", "mae",
            "--optimizer", "sgd",
            "--exp-decay", "0.5",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let config: TrainConfig = args.into();
        assert_eq!(config.artifact_root, PathBuf::from("/tmp/out"));
        assert_eq!(config.epochs, 3);
        assert_eq!(config.metrics, vec!["mae".to_string()]);
        assert_eq!(config.optimizer, "sgd");
        assert_eq!(config.schedule.exp_decay, 0.5);
    }

    #[test]
    fn test_all_rows_lifts_the_cap() {
        let cli = Cli::try_parse_from(["rating-embeddings", "preprocess", "--all-rows"]).unwrap();
        let Commands::Preprocess(args) = cli.command else { panic!("expected preprocess") };

        let config: PreprocessConfig = args.into();
        assert_eq!(config.max_rows, None);
    }
}
