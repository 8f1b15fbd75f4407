// ============================================================
// Layer 2 - RunUseCase
// ============================================================
// Preprocessing followed by training with one shared
// configuration. Both stages read and write the same artifact
// root; training only starts once every preprocessing artifact
// has been written.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::application::{
    preprocess_use_case::{PreprocessConfig, PreprocessSummary, PreprocessUseCase},
    train_use_case::{TrainConfig, TrainSummary, TrainUseCase},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub train:      TrainConfig,
}

impl PipelineConfig {
    /// Point both stages at the same artifact root and seed.
    pub fn aligned(mut self) -> Self {
        self.train.artifact_root = self.preprocess.artifact_root.clone();
        self.train.seed          = self.preprocess.seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub preprocess: PreprocessSummary,
    pub train:      TrainSummary,
}

pub struct RunUseCase {
    config: PipelineConfig,
}

impl RunUseCase {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config: config.aligned() }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        let preprocess = PreprocessUseCase::new(self.config.preprocess.clone()).execute()?;
        let train      = TrainUseCase::new(self.config.train.clone()).execute()?;
        Ok(RunSummary { preprocess, train })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::path::Path;

    use crate::infra::artifacts::ArtifactStore;

    const USERS:         u64 = 25;
    const ROWS_PER_USER: u64 = 400;

    /// 25 users × 400 ratings = 10,000 rows, ratings cycling 1..=10.
    fn write_synthetic_ratings(path: &Path) {
        let mut text = String::from("user_id,anime_id,rating\n");
        for u in 0..USERS {
            for k in 0..ROWS_PER_USER {
                let item   = 1_000 + (u * 37 + k * 11) % 500;
                let rating = (u + k) % 10 + 1;
                writeln!(text, "{},{},{}", 100 + u, item, rating).unwrap();
            }
        }
        std::fs::write(path, text).unwrap();
    }

    fn pipeline(dir: &Path) -> PipelineConfig {
        let ratings = dir.join("animelist.csv");
        write_synthetic_ratings(&ratings);
        PipelineConfig {
            preprocess: PreprocessConfig {
                ratings_csv:   ratings,
                artifact_root: dir.join("artifacts"),
                max_rows:      None,
                ..PreprocessConfig::default()
            },
            train: TrainConfig {
                embedding_size: 8,
                epochs:         2,
                batch_size:     2_000,
                ..TrainConfig::default()
            },
        }
    }

    #[test]
    fn test_full_run_is_reproducible() {
        let first_dir  = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();

        let first  = RunUseCase::new(pipeline(first_dir.path())).execute().unwrap();
        let second = RunUseCase::new(pipeline(second_dir.path())).execute().unwrap();

        // every user meets the default threshold of 400
        assert_eq!(first.preprocess.loaded_rows, 10_000);
        assert_eq!(first.preprocess.kept_rows, 10_000);
        assert_eq!(first.preprocess.num_users, USERS as usize);
        assert_eq!(first.preprocess.test_rows, 2_000);

        let store = ArtifactStore::new(first_dir.path().join("artifacts"));
        assert!(store.model_dir().join("model.mpk.gz").exists());
        assert!(store.user_weights_path().exists());
        assert!(store.item_weights_path().exists());
        for file in ["user2user_encoded", "user2user_decoded", "item2item_encoded", "item2item_decoded"] {
            assert!(store.processed_dir().join(format!("{file}.json")).exists(), "{file} missing");
        }

        let other = ArtifactStore::new(second_dir.path().join("artifacts"));
        assert_eq!(store.load_split().unwrap(), other.load_split().unwrap());
        assert_eq!(first.train.learning_rates, second.train.learning_rates);
        assert_eq!(first.train.epochs_run, 2);
    }
}
