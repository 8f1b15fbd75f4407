use std::str::FromStr;

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{RatingBatch, MAX_TABLE_ROWS};
use crate::domain::error::{RecError, RecResult};

/// Square-sum floor used when L2-normalising tower outputs.
const NORM_EPS: f64 = 1e-12;
/// Predictions are clamped into [EPS, 1 - EPS] before taking logs.
const BCE_EPS: f64 = 1e-7;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct RecommenderConfig {
    pub num_users:      usize,
    pub num_items:      usize,
    #[config(default = 128)]
    pub embedding_size: usize,
}

impl RecommenderConfig {
    /// Table sizes come from the encoder cardinalities; none may be zero.
    pub fn validate(&self) -> RecResult<()> {
        if self.num_users == 0 {
            return Err(RecError::ModelBuild("user embedding table would be empty".into()));
        }
        if self.num_items == 0 {
            return Err(RecError::ModelBuild("item embedding table would be empty".into()));
        }
        if self.embedding_size == 0 {
            return Err(RecError::ModelBuild("embedding size must be positive".into()));
        }
        // ids are batched as i32
        for (table, rows) in [("user", self.num_users), ("item", self.num_items)] {
            if rows > MAX_TABLE_ROWS {
                return Err(RecError::ModelBuild(format!(
                    "{table} embedding table has {rows} rows, at most {MAX_TABLE_ROWS} can be indexed"
                )));
            }
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> RecResult<RecommenderModel<B>> {
        self.validate()?;
        let user_embedding = EmbeddingConfig::new(self.num_users, self.embedding_size).init(device);
        let item_embedding = EmbeddingConfig::new(self.num_items, self.embedding_size).init(device);
        // scalar scale + bias on top of the cosine similarity
        let calibration    = LinearConfig::new(1, 1).init(device);
        Ok(RecommenderModel { user_embedding, item_embedding, calibration })
    }
}

/// Two-tower latent factor model:
///
///   sigmoid(w · cos(user_vec, item_vec) + b)
#[derive(Module, Debug)]
pub struct RecommenderModel<B: Backend> {
    pub user_embedding: Embedding<B>,
    pub item_embedding: Embedding<B>,
    pub calibration:    Linear<B>,
}

impl<B: Backend> RecommenderModel<B> {
    /// users, items: [batch, 1] → cosine similarity [batch, 1]
    pub fn similarity(&self, users: Tensor<B, 2, Int>, items: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, _] = users.dims();
        let dim = self.user_embedding.weight.val().dims()[1];

        // [batch, 1, dim] → [batch, dim]
        let user_vec = self.user_embedding.forward(users).reshape([batch_size, dim]);
        let item_vec = self.item_embedding.forward(items).reshape([batch_size, dim]);

        (l2_normalize(user_vec) * l2_normalize(item_vec)).sum_dim(1)
    }

    /// users, items: [batch, 1] → predicted normalised rating [batch] in (0, 1)
    pub fn forward(&self, users: Tensor<B, 2, Int>, items: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let [batch_size, _] = users.dims();
        let logits = self.calibration.forward(self.similarity(users, items));
        sigmoid(logits).reshape([batch_size])
    }

    /// Returns (scalar loss, predictions).
    pub fn forward_loss(&self, batch: RatingBatch<B>, loss: LossKind) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let preds = self.forward(batch.users, batch.items);
        let value = loss.compute(preds.clone(), batch.targets);
        (value, preds)
    }
}

/// Row-wise x / ||x||₂ for a [batch, dim] tensor.
fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = (x.clone() * x.clone()).sum_dim(1).clamp_min(NORM_EPS).sqrt();
    x / norm
}

// ─── Loss / metric / optimizer names ─────────────────────────────────────────
// These arrive as strings from the CLI and are resolved here, so
// an unknown name fails as a model build error before training.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    BinaryCrossentropy,
    Mse,
    Mae,
}

impl LossKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BinaryCrossentropy => "binary_crossentropy",
            Self::Mse                => "mse",
            Self::Mae                => "mae",
        }
    }

    /// Mean loss over the batch: preds and targets are both [batch].
    pub fn compute<B: Backend>(&self, preds: Tensor<B, 1>, targets: Tensor<B, 1>) -> Tensor<B, 1> {
        match self {
            Self::BinaryCrossentropy => {
                let p = preds.clamp(BCE_EPS, 1.0 - BCE_EPS);
                let positive = targets.clone() * p.clone().log();
                let negative = targets.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log();
                (positive + negative).neg().mean()
            }
            Self::Mse => {
                let diff = preds - targets;
                (diff.clone() * diff).mean()
            }
            Self::Mae => (preds - targets).abs().mean(),
        }
    }
}

impl FromStr for LossKind {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary_crossentropy" | "bce"      => Ok(Self::BinaryCrossentropy),
            "mse" | "mean_squared_error"       => Ok(Self::Mse),
            "mae" | "mean_absolute_error"      => Ok(Self::Mae),
            other => Err(RecError::ModelBuild(format!("unknown loss '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Mae,
    Mse,
}

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mae => "mae",
            Self::Mse => "mse",
        }
    }

    pub fn compute<B: Backend>(&self, preds: Tensor<B, 1>, targets: Tensor<B, 1>) -> Tensor<B, 1> {
        match self {
            Self::Mae => LossKind::Mae.compute(preds, targets),
            Self::Mse => LossKind::Mse.compute(preds, targets),
        }
    }
}

impl FromStr for MetricKind {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mae" | "mean_absolute_error" => Ok(Self::Mae),
            "mse" | "mean_squared_error"  => Ok(Self::Mse),
            other => Err(RecError::ModelBuild(format!("unknown metric '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "sgd"  => Ok(Self::Sgd),
            other  => Err(RecError::ModelBuild(format!("unknown optimizer '{other}'"))),
        }
    }
}

/// Loss, optimizer and metrics after name resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub loss:      LossKind,
    pub optimizer: OptimizerKind,
    pub metrics:   Vec<MetricKind>,
}

impl ModelSpec {
    pub fn resolve(loss: &str, optimizer: &str, metrics: &[String]) -> RecResult<Self> {
        let metrics = metrics
            .iter()
            .map(|m| m.parse())
            .collect::<RecResult<Vec<MetricKind>>>()?;
        Ok(Self {
            loss:      loss.parse()?,
            optimizer: optimizer.parse()?,
            metrics,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_zero_cardinality_is_a_build_error() {
        let device = Default::default();
        let err = RecommenderConfig::new(0, 5).init::<TestBackend>(&device).unwrap_err();
        assert!(matches!(err, RecError::ModelBuild(_)));

        let err = RecommenderConfig::new(3, 0).init::<TestBackend>(&device).unwrap_err();
        assert!(matches!(err, RecError::ModelBuild(_)));

        let err = RecommenderConfig::new(3, 5)
            .with_embedding_size(0)
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(matches!(err, RecError::ModelBuild(_)));
    }

    #[test]
    fn test_tables_past_i32_range_are_rejected() {
        let err = RecommenderConfig::new(MAX_TABLE_ROWS + 1, 5).validate().unwrap_err();
        assert!(matches!(err, RecError::ModelBuild(ref m) if m.starts_with("user")));

        let err = RecommenderConfig::new(3, MAX_TABLE_ROWS + 1).validate().unwrap_err();
        assert!(matches!(err, RecError::ModelBuild(ref m) if m.starts_with("item")));

        assert!(RecommenderConfig::new(MAX_TABLE_ROWS, 5).validate().is_ok());
    }

    #[test]
    fn test_table_shapes() {
        let device = Default::default();
        let model: RecommenderModel<TestBackend> = RecommenderConfig::new(10, 4)
            .with_embedding_size(8)
            .init(&device)
            .unwrap();
        assert_eq!(model.user_embedding.weight.val().dims(), [10, 8]);
        assert_eq!(model.item_embedding.weight.val().dims(), [4, 8]);
    }

    #[test]
    fn test_forward_is_a_probability_per_row() {
        let device = Default::default();
        let model: RecommenderModel<TestBackend> = RecommenderConfig::new(10, 5)
            .with_embedding_size(16)
            .init(&device)
            .unwrap();

        let users = Tensor::<TestBackend, 1, Int>::from_ints([0, 3, 9].as_slice(), &device).reshape([3, 1]);
        let items = Tensor::<TestBackend, 1, Int>::from_ints([4, 0, 2].as_slice(), &device).reshape([3, 1]);

        let sims = model.similarity(users.clone(), items.clone()).into_data().to_vec::<f32>().unwrap();
        assert!(sims.iter().all(|s| (-1.0001..=1.0001).contains(s)));

        let preds = model.forward(users, items);
        assert_eq!(preds.dims(), [3]);
        let preds = preds.into_data().to_vec::<f32>().unwrap();
        assert!(preds.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_loss_values() {
        let device  = Default::default();
        let preds   = Tensor::<TestBackend, 1>::from_floats([0.5, 0.5].as_slice(), &device);
        let targets = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0].as_slice(), &device);

        let mse = scalar(LossKind::Mse.compute(preds.clone(), targets.clone()));
        let mae = scalar(LossKind::Mae.compute(preds.clone(), targets.clone()));
        let bce = scalar(LossKind::BinaryCrossentropy.compute(preds, targets));

        assert!((mse - 0.25).abs() < 1e-6);
        assert!((mae - 0.5).abs() < 1e-6);
        assert!((bce - std::f64::consts::LN_2).abs() < 1e-4);
    }

    #[test]
    fn test_bce_is_finite_at_the_edges() {
        let device  = Default::default();
        let preds   = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0].as_slice(), &device);
        let targets = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0].as_slice(), &device);
        assert!(scalar(LossKind::BinaryCrossentropy.compute(preds, targets)).is_finite());
    }

    #[test]
    fn test_name_resolution() {
        let spec = ModelSpec::resolve("binary_crossentropy", "Adam", &["mae".into(), "mse".into()]).unwrap();
        assert_eq!(spec.loss, LossKind::BinaryCrossentropy);
        assert_eq!(spec.optimizer, OptimizerKind::Adam);
        assert_eq!(spec.metrics, vec![MetricKind::Mae, MetricKind::Mse]);

        assert!(matches!(ModelSpec::resolve("hinge", "adam", &[]), Err(RecError::ModelBuild(_))));
        assert!(matches!(ModelSpec::resolve("mse", "rmsprop", &[]), Err(RecError::ModelBuild(_))));
        assert!(matches!(ModelSpec::resolve("mse", "adam", &["auc".into()]), Err(RecError::ModelBuild(_))));
    }
}
