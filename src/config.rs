//! Runtime configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `LIFEBEAT_DATA_PATH` | `data/Heart_Attack_data.csv` |
//! | `LIFEBEAT_MODEL_DIR` | `app/model` |
//! | `LIFEBEAT_SEED` | `62` |
//! | `LIFEBEAT_TEST_RATIO` | `0.2` |
//! | `LIFEBEAT_CV_FOLDS` | `7` |
//! | `LIFEBEAT_MAX_ITER` | `1000` |
//! | `LIFEBEAT_CV_ON_HOLDOUT` | `false` |
//! | `LIFEBEAT_THRESHOLD` | `0.5` |
//! | `LIFEBEAT_LOG_MODE` | `auto` (`file` on a TTY, else `stderr`) |
//! | `LIFEBEAT_LOG_FILE` | `logs/lifebeat.log` |
//!
//! A variable that is set but malformed is a `Config` error.

use std::path::PathBuf;
use std::str::FromStr;

use crate::application::TrainingConfig;
use crate::domain::{CrossValidationScope, DEFAULT_THRESHOLD};
use crate::{LifebeatError, Result};

const DEFAULT_DATA_PATH: &str = "data/Heart_Attack_data.csv";
const DEFAULT_MODEL_DIR: &str = "app/model";
const DEFAULT_LOG_FILE: &str = "logs/lifebeat.log";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// File when attached to a terminal, stderr otherwise.
    Auto,
    File,
    Stdout,
    Stderr,
}

impl FromStr for LogMode {
    type Err = LifebeatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            other => Err(LifebeatError::Config(format!(
                "LIFEBEAT_LOG_MODE must be one of auto|file|stdout|stderr, got '{other}'"
            ))),
        }
    }
}

/// Logging destination settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub mode: LogMode,
    pub file: PathBuf,
}

/// Process-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub model_dir: PathBuf,
    pub threshold: f64,
    pub training: TrainingConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `Config` if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns `Config` if a value is unparsable or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TrainingConfig::default();
        let mut training = TrainingConfig {
            seed: parse_var(&lookup, "LIFEBEAT_SEED")?.unwrap_or(defaults.seed),
            test_ratio: parse_var(&lookup, "LIFEBEAT_TEST_RATIO")?.unwrap_or(defaults.test_ratio),
            folds: parse_var(&lookup, "LIFEBEAT_CV_FOLDS")?.unwrap_or(defaults.folds),
            ..defaults
        };
        if let Some(max_iter) = parse_var(&lookup, "LIFEBEAT_MAX_ITER")? {
            training.classifier.max_iter = max_iter;
        }
        if parse_bool(&lookup, "LIFEBEAT_CV_ON_HOLDOUT")? {
            training.cv_scope = CrossValidationScope::HoldoutSplit;
        }
        training.validate()?;

        let threshold = parse_var(&lookup, "LIFEBEAT_THRESHOLD")?.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LifebeatError::Config(format!(
                "LIFEBEAT_THRESHOLD must be in [0, 1], got {threshold}"
            )));
        }
        training.threshold = threshold;

        Ok(Self {
            data_path: lookup("LIFEBEAT_DATA_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DATA_PATH), PathBuf::from),
            model_dir: lookup("LIFEBEAT_MODEL_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR), PathBuf::from),
            threshold,
            training,
            log: LogConfig {
                mode: parse_var(&lookup, "LIFEBEAT_LOG_MODE")?.unwrap_or(LogMode::Auto),
                file: lookup("LIFEBEAT_LOG_FILE")
                    .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LifebeatError::Config(format!("Invalid value for {key}: '{raw}'"))),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(false),
        Some("1" | "true" | "TRUE" | "yes" | "YES") => Ok(true),
        Some("0" | "false" | "FALSE" | "no" | "NO") => Ok(false),
        Some(other) => Err(LifebeatError::Config(format!(
            "Invalid boolean for {key}: '{other}'"
        ))),
    }
}
