//! # Lifebeat
//!
//! Heart-attack risk estimation from 13 clinical measurements.
//!
//! This crate provides:
//! - An offline training pipeline (standardization + logistic regression)
//! - Durable, integrity-checked model artifacts
//! - A thread-safe inference service scoring single patients
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types and numerical algorithms (scaler, classifier, metrics)
//! - `ports`: Trait definitions for artifact storage and dataset sources
//! - `adapters`: Concrete implementations (filesystem, CSV, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `config` / `logging`: Process setup shared by the binaries

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;

pub use domain::{PatientFeatures, RiskAssessment, RiskLevel};

/// Result type for Lifebeat operations
pub type Result<T> = std::result::Result<T, LifebeatError>;

/// Main error type for Lifebeat
#[derive(Debug, thiserror::Error)]
pub enum LifebeatError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid patient data: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
