// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain structs, enums and traits that describe the pipeline's
// data: rating rows, the id bijections, the train/test split,
// catalog rows and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn types
//   - NO file I/O
//   - Only plain Rust data and the traits other layers implement

/// Stage error taxonomy
pub mod error;

/// Raw and encoded rating rows, feature columns, split
pub mod rating;

/// First-seen-order id bijections for users and items
pub mod encoding;

/// Processed catalog and synopsis rows
pub mod catalog;

/// Core abstractions (traits) that other layers implement
pub mod traits;
