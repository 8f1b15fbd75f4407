// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// One use case per pipeline stage. Each one only coordinates:
// the work itself lives in data (Layer 4), ml (Layer 5) and
// infra (Layer 6).
//
// Every use case wraps its failures with the stage name
// ("preprocessing stage failed", "training stage failed")
// on top of the typed RecError underneath.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Load → filter → scale → encode → split → persist
pub mod preprocess_use_case;

// Load split → build model → train → export weights
pub mod train_use_case;

// Both stages with one shared configuration
pub mod run_use_case;
