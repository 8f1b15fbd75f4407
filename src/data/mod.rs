// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from the raw rating table to tensor batches.
//
//   ratings.csv
//       │
//       ▼
//   CsvRatingLoader   → reads rows, filter_users drops quiet users
//       │
//       ▼
//   MinMaxScaler      → fits global min/max of the rating column
//       │
//       ▼
//   encoder           → user/item bijections + encoded rows
//       │
//       ▼
//   splitter          → seeded row-wise train/test split
//       │
//       ▼
//   RatingDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   RatingBatcher     → stacks samples into tensors
//
// The catalog loader sits beside this chain: it only cleans the
// item tables that ship with the encoders.

/// Reads the rating CSV and filters low-activity users
pub mod loader;

/// Cleans the item catalog and synopsis tables
pub mod catalog;

/// Min-max rating scaling with persisted range
pub mod normalizer;

/// Builds the id bijections and encodes rows
pub mod encoder;

/// Seeded train/test split
pub mod splitter;

/// Implements Burn's Dataset trait for rating samples
pub mod dataset;

/// Stacks rating samples into tensor batches
pub mod batcher;
