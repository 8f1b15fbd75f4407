// ============================================================
// Layer 4 - Rating Batcher
// ============================================================
// Stacks a mini-batch of RatingSamples into the tensors the two-tower
// model consumes:
//
//   users:   [batch_size, 1]  Int   (one index per row)
//   items:   [batch_size, 1]  Int
//   targets: [batch_size]     Float (normalised rating)
//
// The trailing dimension of size 1 is the "sequence" axis the
// Embedding module expects; the model folds it away after the
// lookup.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::RatingSample;

/// Largest embedding table the batcher can index: Int tensors are
/// built from i32.
pub const MAX_TABLE_ROWS: usize = i32::MAX as usize;

// ─── RatingBatch ──────────────────────────────────────────────────────────────
/// A batch of rating samples ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct RatingBatch<B: Backend> {
    /// Encoded user ids - shape: [batch_size, 1]
    pub users: Tensor<B, 2, Int>,

    /// Encoded item ids - shape: [batch_size, 1]
    pub items: Tensor<B, 2, Int>,

    /// Normalised ratings - shape: [batch_size]
    pub targets: Tensor<B, 1>,
}

impl<B: Backend> RatingBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }
}

// ─── RatingBatcher ────────────────────────────────────────────────────────────
/// Stateless: the DataLoader hands in the device to build on.
#[derive(Clone, Debug, Default)]
pub struct RatingBatcher;

impl RatingBatcher {
    pub fn new() -> Self {
        Self
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// This is what makes RatingBatcher work with Burn's DataLoader.
// The DataLoader calls .batch(items, device) with each mini-batch,
// the last one possibly shorter than the rest.
impl<B: Backend> Batcher<B, RatingSample, RatingBatch<B>> for RatingBatcher {
    fn batch(&self, items: Vec<RatingSample>, device: &B::Device) -> RatingBatch<B> {
        let batch_size = items.len();

        // Tables are capped at MAX_TABLE_ROWS rows when the model is
        // built, so every in-range encoded id fits an i32
        let users:    Vec<i32> = items.iter().map(|s| s.user as i32).collect();
        let item_ids: Vec<i32> = items.iter().map(|s| s.item as i32).collect();
        let targets:  Vec<f32> = items.iter().map(|s| s.rating).collect();

        let users = Tensor::<B, 1, Int>::from_ints(users.as_slice(), device)
            .reshape([batch_size, 1]);
        let items = Tensor::<B, 1, Int>::from_ints(item_ids.as_slice(), device)
            .reshape([batch_size, 1]);
        let targets = Tensor::<B, 1>::from_floats(targets.as_slice(), device);

        RatingBatch { users, items, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let device  = <TestBackend as Backend>::Device::default();
        let samples = vec![
            RatingSample { user: 0, item: 3, rating: 0.25 },
            RatingSample { user: 2, item: 1, rating: 1.0 },
        ];

        let batch = Batcher::<TestBackend, _, _>::batch(&RatingBatcher::new(), samples, &device);
        assert_eq!(batch.users.dims(), [2, 1]);
        assert_eq!(batch.items.dims(), [2, 1]);
        assert_eq!(batch.targets.dims(), [2]);
        assert_eq!(batch.len(), 2);

        let targets = batch.targets.into_data().to_vec::<f32>().unwrap();
        assert_eq!(targets, vec![0.25, 1.0]);
    }
}
