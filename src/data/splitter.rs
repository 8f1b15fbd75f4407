// ============================================================
// Layer 4 - Train/Test Splitter
// ============================================================
// Shuffles rows with a seeded RNG and reserves a fraction of
// them for testing:
//   - Training set: used to update the embeddings
//   - Test set:     monitored for checkpointing / early stopping
//
// The permutation comes from StdRng::seed_from_u64(seed), so the
// same seed and the same input always give the same split.
// The test side gets ceil(fraction * n) rows.
//
// Rows are split, not (user, item) pairs: a pair that occurs
// twice in the input can land on both sides.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::{EncodedRating, FeatureColumns, TrainTestSplit};

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED:          u64 = 42;

/// Shuffle `samples` with `seed` and split into (train, test).
///
/// # Arguments
/// * `samples`       - All rows (consumed by this function)
/// * `test_fraction` - Proportion reserved for testing, `0 <= f < 1`
/// * `seed`          - Seed of the shuffling permutation
pub fn split_train_test<T>(
    mut samples:   Vec<T>,
    test_fraction: f64,
    seed:          u64,
) -> RecResult<(Vec<T>, Vec<T>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(RecError::InvalidConfig(format!(
            "test fraction must be in [0, 1), got {test_fraction}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total  = samples.len();
    let n_test = ((total as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.min(total);

    // split_off(n) leaves [0..n) in place and returns [n..total)
    let train = samples.split_off(n_test);
    let test  = samples;

    tracing::debug!(
        "Dataset split: {} training, {} test (seed {})",
        train.len(),
        test.len(),
        seed,
    );

    Ok((train, test))
}

/// Split encoded rows into the column-wise train/test layout.
pub fn split_ratings(
    rows:          &[EncodedRating],
    test_fraction: f64,
    seed:          u64,
) -> RecResult<TrainTestSplit> {
    let (train, test) = split_train_test(rows.to_vec(), test_fraction, seed)?;

    let (x_train, y_train) = to_columns(&train);
    let (x_test, y_test)   = to_columns(&test);

    tracing::info!("Split: {} train, {} test", y_train.len(), y_test.len());
    Ok(TrainTestSplit { x_train, x_test, y_train, y_test })
}

fn to_columns(rows: &[EncodedRating]) -> (FeatureColumns, Vec<f64>) {
    let mut features = FeatureColumns::default();
    let mut targets  = Vec::with_capacity(rows.len());
    for r in rows {
        features.push(r.user, r.item);
        targets.push(r.rating);
    }
    (features, targets)
}
