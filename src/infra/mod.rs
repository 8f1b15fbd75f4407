// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Everything that touches the artifact directory:
//
//   artifacts.rs  - Typed save/load of every pipeline output
//                   (id mappings, splits, scaler, processed
//                   tables, model record, embedding weights)
//                   under one artifact root.
//
//   checkpoint.rs - Best-epoch model checkpoint. Overwritten
//                   whenever validation loss improves, read
//                   back once training ends.
//
//   metrics.rs    - Per-epoch metrics CSV and the run history
//                   as JSON. Best effort: a failed write is a
//                   warning, never a failed run.

/// Artifact layout and typed persistence
pub mod artifacts;

/// Best-epoch checkpoint save and restore
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
