//! Adapters layer: Concrete implementations of ports.
//!
//! - `fs`: model artifacts on the local filesystem
//! - `csv`: the labeled training table
//! - `sanitize`: redaction of measurements and secrets in logs

pub mod csv;
pub mod fs;
pub mod sanitize;

// Re-export storage error for lib.rs
pub use fs::StorageError;
