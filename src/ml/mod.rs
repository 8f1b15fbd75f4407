// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// Model, optimisation and weight export. The trainer is the
// only place that picks a backend; everything else is generic
// over `B: Backend`.
//
//   model.rs    - Two-tower embedding model: user and item
//                 tables, cosine similarity, Linear(1→1),
//                 sigmoid. Also resolves loss / metric /
//                 optimiser names.
//
//   schedule.rs - Warmup → sustain → exponential decay
//                 learning rate, and the early stopping
//                 state machine
//
//   trainer.rs  - The epoch loop: shuffled mini-batches,
//                 validation, best checkpoint, early stop,
//                 restore
//
//   weights.rs  - Reads both embedding tables out of the
//                 trained model and L2-normalises each row
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Two-tower embedding model
pub mod model;

/// Learning rate schedule and early stopping
pub mod schedule;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// L2-normalised embedding export
pub mod weights;
