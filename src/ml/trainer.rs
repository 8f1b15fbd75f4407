// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Mini-batch train + validation loop over the encoded split,
// both driven by Burn's DataLoader.
//
// Per epoch, in this order:
//   1. lr = schedule(epoch), fixed for the whole epoch
//   2. one pass over the train loader, step the optimiser
//      once per batch. The loader is seeded once; every
//      pass draws the next permutation from that seed, so
//      the epoch sequence is reproducible.
//   3. model.valid() on the test split: loss + metrics,
//      averaged per sample (the last batch may be short)
//   4. checkpoint if val_loss beats every earlier epoch
//   5. record the epoch (CSV row + history)
//   6. early stop after `patience` stale epochs
//
// After the loop the best checkpoint is restored, whatever
// epoch the loop ended on.
//
// Key Burn 0.20 insight:
//   - Training uses TrainBackend (Autodiff<..>) for gradients
//   - model.valid() returns the model on InferenceBackend
//   - the validation loader must use InferenceBackend too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{RatingBatch, RatingBatcher},
    dataset::{RatingDataset, RatingSample},
};
use crate::domain::{
    error::{RecError, RecResult},
    rating::TrainTestSplit,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::{MetricKind, ModelSpec, OptimizerKind, RecommenderModel},
    schedule::{EarlyStopping, EpochVerdict},
};

#[cfg(not(feature = "wgpu"))]
pub type InferenceBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
pub type InferenceBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InferenceBackend>;
pub type TrainDevice  = <TrainBackend as Backend>::Device;

type TrainLoader = Arc<dyn DataLoader<TrainBackend, RatingBatch<TrainBackend>>>;
type ValidLoader = Arc<dyn DataLoader<InferenceBackend, RatingBatch<InferenceBackend>>>;

/// What a finished run hands back.
pub struct TrainingOutcome {
    /// Weights of the best epoch, already restored
    pub model:         RecommenderModel<TrainBackend>,
    pub history:       Vec<EpochMetrics>,
    pub best_epoch:    usize,
    pub stopped_early: bool,
}

/// Train `model` on `split` and return it restored to its best epoch.
pub fn run_training(
    cfg:          &TrainConfig,
    spec:         &ModelSpec,
    model:        RecommenderModel<TrainBackend>,
    split:        &TrainTestSplit,
    ckpt_manager: &CheckpointManager,
    metrics:      Option<&MetricsLogger>,
    device:       &TrainDevice,
) -> RecResult<TrainingOutcome> {
    check_inputs(cfg, split)?;

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    // No num_workers: batches are built on this thread, in order.
    let train_loader: TrainLoader =
        DataLoaderBuilder::<TrainBackend, RatingSample, RatingBatch<TrainBackend>>::new(RatingBatcher::new())
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .set_device(device.clone())
            .build(RatingDataset::from_columns(&split.x_train, &split.y_train));

    // ── Validation data loader (InnerBackend, no autodiff overhead) ──────────
    let val_loader: ValidLoader =
        DataLoaderBuilder::<InferenceBackend, RatingSample, RatingBatch<InferenceBackend>>::new(RatingBatcher::new())
            .batch_size(cfg.batch_size)
            .set_device(device.clone())
            .build(RatingDataset::from_columns(&split.x_test, &split.y_test));

    let ctx = LoopContext { cfg, spec, ckpt_manager, metrics, device };

    // Each optimiser has its own concrete type, so the loop is
    // monomorphised per optimiser.
    match spec.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new()
                .with_epsilon(1e-7)
                .init::<TrainBackend, RecommenderModel<TrainBackend>>();
            train_loop(&ctx, model, optim, &train_loader, &val_loader)
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init::<TrainBackend, RecommenderModel<TrainBackend>>();
            train_loop(&ctx, model, optim, &train_loader, &val_loader)
        }
    }
}

fn check_inputs(cfg: &TrainConfig, split: &TrainTestSplit) -> RecResult<()> {
    if cfg.epochs == 0 {
        return Err(RecError::InvalidConfig("epochs must be at least 1".into()));
    }
    if cfg.batch_size == 0 {
        return Err(RecError::InvalidConfig("batch_size must be at least 1".into()));
    }
    if split.x_train.is_empty() || split.x_test.is_empty() {
        return Err(RecError::InvalidConfig(format!(
            "both split sides need rows (train={}, test={})",
            split.train_len(),
            split.test_len(),
        )));
    }
    cfg.schedule.validate()
}

struct LoopContext<'a> {
    cfg:          &'a TrainConfig,
    spec:         &'a ModelSpec,
    ckpt_manager: &'a CheckpointManager,
    metrics:      Option<&'a MetricsLogger>,
    device:       &'a TrainDevice,
}

/// Sample-weighted validation results of one epoch.
struct Validation {
    loss: f64,
    mae:  Option<f64>,
    mse:  Option<f64>,
}

fn train_loop<O>(
    ctx:          &LoopContext<'_>,
    mut model:    RecommenderModel<TrainBackend>,
    mut optim:    O,
    train_loader: &TrainLoader,
    val_loader:   &ValidLoader,
) -> RecResult<TrainingOutcome>
where
    O: Optimizer<RecommenderModel<TrainBackend>, TrainBackend>,
{
    let cfg = ctx.cfg;

    let mut early_stop    = EarlyStopping::new(cfg.patience);
    let mut history       = Vec::with_capacity(cfg.epochs);
    let mut stopped_early = false;

    tracing::info!(
        "Training for up to {} epochs: {} train rows, {} val rows, batch size {}, loss {}, metrics [{}]",
        cfg.epochs,
        train_loader.num_items(),
        val_loader.num_items(),
        cfg.batch_size,
        ctx.spec.loss.name(),
        ctx.spec.metrics.iter().map(MetricKind::name).collect::<Vec<_>>().join(", "),
    );

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 0..cfg.epochs {
        let lr = cfg.schedule.learning_rate(epoch);

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_seen     = 0usize;

        for batch in train_loader.iter() {
            let n = batch.len();

            let (loss, _) = model.forward_loss(batch, ctx.spec.loss);
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                return Err(RecError::training(epoch, format!("training loss became {loss_val}")));
            }
            train_loss_sum += loss_val * n as f64;
            train_seen     += n;

            // Backward pass + optimiser update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }
        let train_loss = train_loss_sum / train_seen as f64;

        // ── Validation phase ──────────────────────────────────────────────────
        let val = validate(ctx.spec, &model.valid(), val_loader);
        if !val.loss.is_finite() {
            return Err(RecError::training(epoch, format!("validation loss became {}", val.loss)));
        }

        // ── End of epoch: checkpoint → record → early stop ────────────────────
        let verdict  = early_stop.observe(epoch, val.loss);
        let improved = verdict == EpochVerdict::Improved;
        if improved {
            ctx.ckpt_manager
                .save_best(&model, epoch)
                .map_err(|e| RecError::training_caused(epoch, "cannot checkpoint best epoch", e))?;
        }

        let row = EpochMetrics {
            epoch,
            learning_rate: lr,
            train_loss,
            val_loss: val.loss,
            val_mae:  val.mae,
            val_mse:  val.mse,
            improved,
        };
        if let Some(logger) = ctx.metrics {
            if let Err(e) = logger.log(&row) {
                tracing::warn!("Could not log metrics for epoch {}: {:#}", epoch, e);
            }
        }
        history.push(row);

        println!(
            "Epoch {:>3}/{} | lr={:.2e} | train_loss={:.4} | val_loss={:.4}{}{}{}",
            epoch + 1,
            cfg.epochs,
            lr,
            train_loss,
            val.loss,
            val.mae.map(|v| format!(" | mae={v:.4}")).unwrap_or_default(),
            val.mse.map(|v| format!(" | mse={v:.4}")).unwrap_or_default(),
            if improved { " *" } else { "" },
        );

        if verdict == EpochVerdict::Stop {
            tracing::info!("Early stopping after epoch {}: no improvement in {} epochs", epoch, cfg.patience);
            stopped_early = true;
            break;
        }
    }

    // The first finite epoch always improves on +inf, so a checkpoint exists.
    let best_epoch = early_stop
        .best_epoch()
        .ok_or_else(|| RecError::training(history.len(), "no epoch was checkpointed"))?;
    let model = ctx
        .ckpt_manager
        .load_best(model, ctx.device)
        .map_err(|e| RecError::training_caused(best_epoch, "cannot restore best checkpoint", e))?;

    tracing::info!(
        "Training complete! Best epoch {} with val_loss={:.4}",
        best_epoch,
        early_stop.best_loss(),
    );

    Ok(TrainingOutcome { model, history, best_epoch, stopped_early })
}

/// Loss and metrics on the frozen model, weighted by batch size.
fn validate(
    spec:   &ModelSpec,
    model:  &RecommenderModel<InferenceBackend>,
    loader: &ValidLoader,
) -> Validation {
    let wants = |m: MetricKind| spec.metrics.contains(&m);

    let mut loss_sum = 0.0f64;
    let mut mae_sum  = 0.0f64;
    let mut mse_sum  = 0.0f64;
    let mut seen     = 0usize;

    for batch in loader.iter() {
        let len = batch.len();
        let n   = len as f64;

        let preds = model.forward(batch.users, batch.items);
        let loss  = spec.loss.compute(preds.clone(), batch.targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * n;

        if wants(MetricKind::Mae) {
            let v = MetricKind::Mae.compute(preds.clone(), batch.targets.clone());
            mae_sum += v.into_scalar().elem::<f64>() * n;
        }
        if wants(MetricKind::Mse) {
            let v = MetricKind::Mse.compute(preds, batch.targets);
            mse_sum += v.into_scalar().elem::<f64>() * n;
        }
        seen += len;
    }

    let total = seen as f64;
    Validation {
        loss: loss_sum / total,
        mae:  wants(MetricKind::Mae).then(|| mae_sum / total),
        mse:  wants(MetricKind::Mse).then(|| mse_sum / total),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{model::RecommenderConfig, schedule::LrSchedule, weights::table_to_array};

    /// 6 users × 4 items, users 0-2 like even items, 3-5 like odd ones.
    fn toy_split() -> TrainTestSplit {
        let mut split = TrainTestSplit::default();
        for u in 0..6u32 {
            for i in 0..4u32 {
                let y = if (u < 3) == (i % 2 == 0) { 1.0 } else { 0.0 };
                if (u + i) % 5 == 0 {
                    split.x_test.push(u, i);
                    split.y_test.push(y);
                } else {
                    split.x_train.push(u, i);
                    split.y_train.push(y);
                }
            }
        }
        split
    }

    fn toy_config(epochs: usize) -> TrainConfig {
        TrainConfig {
            embedding_size: 8,
            epochs,
            batch_size: 5,
            schedule: LrSchedule::new(1e-2, 5e-2, 1e-2, 2, 0, 0.8).unwrap(),
            ..TrainConfig::default()
        }
    }

    fn toy_model(device: &TrainDevice) -> RecommenderModel<TrainBackend> {
        RecommenderConfig::new(6, 4).with_embedding_size(8).init(device).unwrap()
    }

    fn default_spec() -> ModelSpec {
        ModelSpec::resolve("binary_crossentropy", "adam", &["mae".into(), "mse".into()]).unwrap()
    }

    #[test]
    fn test_training_records_every_epoch() {
        let dir    = tempfile::tempdir().unwrap();
        let device = TrainDevice::default();
        let cfg    = toy_config(4);
        let ckpt   = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        let logger = MetricsLogger::new(dir.path().join("model")).unwrap();

        let out = run_training(&cfg, &default_spec(), toy_model(&device), &toy_split(), &ckpt, Some(&logger), &device)
            .unwrap();

        assert_eq!(out.history.len(), 4);
        assert!(!out.stopped_early);
        assert!(out.history[0].improved);
        for (e, row) in out.history.iter().enumerate() {
            assert_eq!(row.epoch, e);
            assert_eq!(row.learning_rate, cfg.schedule.learning_rate(e));
            assert!(row.train_loss.is_finite() && row.val_loss.is_finite());
            assert!(row.val_mae.is_some() && row.val_mse.is_some());
        }

        // best epoch is the one with the lowest validation loss
        let best = out
            .history
            .iter()
            .min_by(|a, b| a.val_loss.total_cmp(&b.val_loss))
            .unwrap();
        assert_eq!(out.best_epoch, best.epoch);
        assert_eq!(ckpt.best_epoch().unwrap(), best.epoch);

        let csv = std::fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn test_returned_model_is_the_best_checkpoint() {
        let dir    = tempfile::tempdir().unwrap();
        let device = TrainDevice::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let out = run_training(&toy_config(3), &default_spec(), toy_model(&device), &toy_split(), &ckpt, None, &device)
            .unwrap();

        let from_disk = ckpt.load_best(toy_model(&device), &device).unwrap();
        let want = table_to_array(from_disk.item_embedding.weight.val(), "item").unwrap();
        let got  = table_to_array(out.model.item_embedding.weight.val(), "item").unwrap();
        assert_eq!(want, got);
    }

    #[test]
    fn test_zero_learning_rate_stops_early() {
        let dir    = tempfile::tempdir().unwrap();
        let device = TrainDevice::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        // an lr that rounds to 0 in f32 keeps the weights fixed,
        // so val_loss never improves after epoch 0
        let cfg = TrainConfig {
            patience: 2,
            schedule: LrSchedule::new(0.0, f64::MIN_POSITIVE, 0.0, 0, 0, 0.5).unwrap(),
            ..toy_config(10)
        };
        let spec = ModelSpec::resolve("mse", "sgd", &[]).unwrap();

        let out = run_training(&cfg, &spec, toy_model(&device), &toy_split(), &ckpt, None, &device).unwrap();
        assert!(out.stopped_early);
        assert_eq!(out.best_epoch, 0);
        assert_eq!(out.history.len(), 3);
        assert!(out.history.iter().all(|r| r.val_mae.is_none() && r.val_mse.is_none()));
    }

    #[test]
    fn test_nan_target_fails_the_first_epoch() {
        let dir    = tempfile::tempdir().unwrap();
        let device = TrainDevice::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let mut split = toy_split();
        split.y_train[0] = f64::NAN;

        let err = run_training(&toy_config(3), &default_spec(), toy_model(&device), &split, &ckpt, None, &device);
        match err {
            Err(RecError::TrainingFailure { epoch, ref message, .. }) => {
                assert_eq!(epoch, 0);
                assert_eq!(message, "training loss became NaN");
            }
            _ => panic!("expected a training failure at epoch 0"),
        }
        assert!(ckpt.best_epoch().is_err());
    }

    #[test]
    fn test_lost_metrics_csv_does_not_stop_training() {
        let dir    = tempfile::tempdir().unwrap();
        let device = TrainDevice::default();
        let ckpt   = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        let logger = MetricsLogger::new(dir.path().join("model")).unwrap();
        std::fs::remove_file(logger.csv_path()).unwrap();

        let out = run_training(&toy_config(3), &default_spec(), toy_model(&device), &toy_split(), &ckpt, Some(&logger), &device)
            .unwrap();

        assert_eq!(out.history.len(), 3);
        assert!(!logger.csv_path().exists());
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let dir    = tempfile::tempdir().unwrap();
        let device = TrainDevice::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let spec   = default_spec();

        let err = run_training(&toy_config(0), &spec, toy_model(&device), &toy_split(), &ckpt, None, &device);
        assert!(matches!(err, Err(RecError::InvalidConfig(_))));

        let no_batch = TrainConfig { batch_size: 0, ..toy_config(2) };
        let err = run_training(&no_batch, &spec, toy_model(&device), &toy_split(), &ckpt, None, &device);
        assert!(matches!(err, Err(RecError::InvalidConfig(_))));

        let mut split = toy_split();
        split.x_test = Default::default();
        split.y_test.clear();
        let err = run_training(&toy_config(2), &spec, toy_model(&device), &split, &ckpt, None, &device);
        assert!(matches!(err, Err(RecError::InvalidConfig(_))));
    }
}
