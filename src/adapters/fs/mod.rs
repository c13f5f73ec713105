//! Filesystem adapter: Implementation of ArtifactStore.
//!
//! Layout of the model directory:
//! - `Heart_Attack_scaler.bin`: bincode envelope around the `ScalerState`
//! - `Heart_Attack_model.bin`: bincode envelope around the `ClassifierState`
//! - `metrics.json`: pretty-printed `TrainingMetrics`
//!
//! # Integrity
//!
//! Every binary artifact is wrapped in an envelope carrying a format
//! version, a run id, the feature names it was trained on and a SHA-256
//! checksum of the payload. The scaler and model of one save share the run
//! id. Loading rejects any mismatch as `Corrupt`, including a scaler and
//! model from different saves.
//!
//! # Atomicity
//!
//! `save` first writes and syncs every file to a temporary sibling in the
//! model directory. Promotion then moves the live files aside to `*.bak`
//! and renames the staged files into place. If any rename fails, the new
//! files are removed and the backups renamed back, so the previous set is
//! what remains on disk.

use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::domain::{ClassifierState, ScalerState, TrainingMetrics, FEATURE_NAMES};
use crate::ports::{ArtifactStore, PersistedModel, TrainedArtifacts};

/// File name of the persisted scaler.
pub const SCALER_FILE: &str = "Heart_Attack_scaler.bin";
/// File name of the persisted classifier.
pub const MODEL_FILE: &str = "Heart_Attack_model.bin";
/// File name of the metrics record.
pub const METRICS_FILE: &str = "metrics.json";

const FORMAT_VERSION: u32 = 2;
const SCALER_KIND: &str = "scaler";
const MODEL_KIND: &str = "logistic_regression";

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Metrics format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt artifact {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    kind: String,
    /// Shared by the scaler and model of one save
    run_id: String,
    feature_names: Vec<String>,
    checksum: String,
    payload: Vec<u8>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Filesystem-backed artifact store rooted at a model directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Create a store for the given model directory.
    ///
    /// The directory is created on the first `save`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    fn encode(kind: &str, payload: Vec<u8>, run_id: &str) -> Result<Vec<u8>, StorageError> {
        let envelope = ArtifactEnvelope {
            format_version: FORMAT_VERSION,
            kind: kind.to_string(),
            run_id: run_id.to_string(),
            feature_names: FEATURE_NAMES.iter().map(|n| (*n).to_string()).collect(),
            checksum: sha256_hex(&payload),
            payload,
        };
        Ok(bincode::serialize(&envelope)?)
    }

    fn decode<T: DeserializeOwned>(
        path: &Path,
        kind: &str,
    ) -> Result<Option<Decoded<T>>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        let envelope: ArtifactEnvelope = bincode::deserialize(&bytes)
            .map_err(|e| corrupt(path, format!("unreadable envelope: {e}")))?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(corrupt(
                path,
                format!("unsupported format version {}", envelope.format_version),
            ));
        }
        if envelope.kind != kind {
            return Err(corrupt(
                path,
                format!("expected a {kind} artifact, found {}", envelope.kind),
            ));
        }
        if envelope.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(corrupt(path, "feature names do not match model order".into()));
        }
        if sha256_hex(&envelope.payload) != envelope.checksum {
            return Err(corrupt(path, "checksum mismatch".into()));
        }

        let value = bincode::deserialize(&envelope.payload)
            .map_err(|e| corrupt(path, format!("unreadable payload: {e}")))?;
        tracing::info!(
            "Loaded {} artifact from {:?} (fingerprint={}, run={})",
            kind,
            path,
            &envelope.checksum[..16],
            envelope.run_id
        );
        Ok(Some(Decoded {
            value,
            run_id: envelope.run_id,
        }))
    }

    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile, StorageError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

/// A decoded envelope payload and the save that wrote it.
struct Decoded<T> {
    value: T,
    run_id: String,
}

fn corrupt(path: &Path, reason: String) -> StorageError {
    StorageError::Corrupt {
        path: path.display().to_string(),
        reason,
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Live files moved aside and new files put in place so far.
#[derive(Default)]
struct Promotion {
    backups: Vec<(PathBuf, PathBuf)>,
    promoted: Vec<PathBuf>,
}

impl Promotion {
    fn run(&mut self, staged: Vec<(NamedTempFile, PathBuf)>) -> Result<(), StorageError> {
        for (_, dest) in &staged {
            if dest.is_file() {
                let backup = backup_path(dest);
                fs::rename(dest, &backup)?;
                self.backups.push((dest.clone(), backup));
            }
        }
        for (tmp, dest) in staged {
            tmp.persist(&dest).map_err(|e| StorageError::Io(e.error))?;
            tracing::debug!("Promoted artifact {:?}", dest);
            self.promoted.push(dest);
        }
        Ok(())
    }

    fn roll_back(self) {
        for dest in &self.promoted {
            if let Err(e) = fs::remove_file(dest) {
                tracing::error!("Failed to remove partially promoted {:?}: {}", dest, e);
            }
        }
        for (live, backup) in &self.backups {
            if let Err(e) = fs::rename(backup, live) {
                tracing::error!("Failed to restore {:?} from {:?}: {}", live, backup, e);
            }
        }
    }

    fn commit(self) {
        for (_, backup) in &self.backups {
            if let Err(e) = fs::remove_file(backup) {
                tracing::warn!("Failed to remove backup {:?}: {}", backup, e);
            }
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    type Error = StorageError;

    fn save(&self, artifacts: &TrainedArtifacts) -> Result<(), Self::Error> {
        fs::create_dir_all(&self.dir)?;

        let scaler = bincode::serialize(&artifacts.scaler)?;
        let model = bincode::serialize(&artifacts.classifier)?;
        let run_id = sha256_hex(&[scaler.as_slice(), model.as_slice()].concat())[..16].to_string();

        let files = [
            (self.scaler_path(), Self::encode(SCALER_KIND, scaler, &run_id)?),
            (self.model_path(), Self::encode(MODEL_KIND, model, &run_id)?),
            (
                self.metrics_path(),
                serde_json::to_vec_pretty(&artifacts.metrics)?,
            ),
        ];

        // Stage everything before touching the live files.
        let mut staged = Vec::with_capacity(files.len());
        for (dest, bytes) in files {
            staged.push((self.stage(&bytes)?, dest));
        }

        let mut promotion = Promotion::default();
        match promotion.run(staged) {
            Ok(()) => promotion.commit(),
            Err(e) => {
                tracing::error!("Artifact promotion failed, restoring previous set: {}", e);
                promotion.roll_back();
                return Err(e);
            }
        }

        tracing::info!("Saved model artifacts to {:?} (run={})", self.dir, run_id);
        Ok(())
    }

    fn load_model(&self) -> Result<Option<PersistedModel>, Self::Error> {
        let scaler_path = self.scaler_path();
        let model_path = self.model_path();
        let Some(scaler) = Self::decode::<ScalerState>(&scaler_path, SCALER_KIND)? else {
            return Ok(None);
        };
        let Some(classifier) = Self::decode::<ClassifierState>(&model_path, MODEL_KIND)? else {
            return Ok(None);
        };
        if scaler.run_id != classifier.run_id {
            return Err(corrupt(
                &model_path,
                format!(
                    "written by run {} but the scaler comes from run {}",
                    classifier.run_id, scaler.run_id
                ),
            ));
        }

        // Re-validate shape: a well-formed payload may still be the wrong size.
        let scaler = ScalerState::new(scaler.value.mean().to_vec(), scaler.value.std_dev().to_vec())
            .map_err(|e| corrupt(&scaler_path, e.to_string()))?;
        let classifier =
            ClassifierState::new(classifier.value.weights().to_vec(), classifier.value.bias())
                .map_err(|e| corrupt(&model_path, e.to_string()))?;
        Ok(Some(PersistedModel { scaler, classifier }))
    }

    fn load_metrics(&self) -> Result<Option<TrainingMetrics>, Self::Error> {
        let path = self.metrics_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn has_artifacts(&self) -> Result<bool, Self::Error> {
        Ok(self.scaler_path().is_file() && self.model_path().is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfusionMatrix, CrossValidationScope, FEATURE_COUNT};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_artifacts(bias: f64) -> TrainedArtifacts {
        let mean: Vec<f64> = (0..FEATURE_COUNT).map(|i| i as f64 * 10.0).collect();
        let std_dev: Vec<f64> = (0..FEATURE_COUNT).map(|i| 1.0 + i as f64).collect();
        let weights: Vec<f64> = (0..FEATURE_COUNT).map(|i| 0.1 * i as f64 - 0.5).collect();
        TrainedArtifacts {
            scaler: ScalerState::new(mean, std_dev).expect("scaler"),
            classifier: ClassifierState::new(weights, bias).expect("classifier"),
            metrics: TrainingMetrics {
                accuracy: 0.85,
                cross_validation_score: 0.82,
                cross_validation_folds: 7,
                cross_validation_scope: CrossValidationScope::TrainingSplit,
                precision: 0.8,
                recall: 0.9,
                f1_score: 0.847,
                roc_auc: Some(0.91),
                confusion_matrix: ConfusionMatrix::default(),
                feature_importance: BTreeMap::new(),
                train_samples: 242,
                test_samples: 61,
                seed: 62,
                iterations: 6,
                converged: true,
                trained_at: chrono::Utc::now(),
            },
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_artifacts_roundtrip() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path().join("model"));
        let artifacts = sample_artifacts(0.25);

        assert!(!store.has_artifacts().expect("check"));
        store.save(&artifacts).expect("save");
        assert!(store.has_artifacts().expect("check"));

        let model = store.load_model().expect("load").expect("model");
        assert_eq!(model.scaler, artifacts.scaler);
        assert_eq!(model.classifier, artifacts.classifier);
        assert_eq!(store.load_metrics().expect("load"), Some(artifacts.metrics));
    }

    #[test]
    fn test_missing_artifacts_load_as_none() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        assert!(store.load_model().expect("load").is_none());
        assert!(store.load_metrics().expect("load").is_none());
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_artifacts(0.1)).expect("save");
        store.save(&sample_artifacts(0.2)).expect("overwrite");

        assert_eq!(
            file_names(temp.path()),
            vec![MODEL_FILE, SCALER_FILE, METRICS_FILE]
        );
        let model = store.load_model().expect("load").expect("model");
        assert_eq!(model.classifier.bias(), 0.2);
    }

    #[test]
    fn test_failed_promotion_restores_previous_set() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_artifacts(0.1)).expect("save");
        let before = store.load_model().expect("load").expect("model");

        // A non-empty directory where metrics.json belongs makes the last
        // rename fail after scaler and model were already promoted.
        fs::remove_file(store.metrics_path()).expect("remove metrics");
        fs::create_dir(store.metrics_path()).expect("mkdir");
        fs::write(store.metrics_path().join("blocker"), b"x").expect("write");

        let err = store.save(&sample_artifacts(0.9)).expect_err("promotion must fail");
        assert!(matches!(err, StorageError::Io(_)));

        let after = store.load_model().expect("load").expect("model");
        assert_eq!(after, before);
        assert_eq!(
            file_names(temp.path()),
            vec![MODEL_FILE, SCALER_FILE, METRICS_FILE]
        );
    }

    #[test]
    fn test_failed_first_save_leaves_nothing_behind() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        fs::create_dir(store.metrics_path()).expect("mkdir");
        fs::write(store.metrics_path().join("blocker"), b"x").expect("write");

        assert!(store.save(&sample_artifacts(0.1)).is_err());
        assert!(!store.has_artifacts().expect("check"));
        assert!(store.load_model().expect("load").is_none());
    }

    #[test]
    fn test_mixed_runs_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let first = FsArtifactStore::new(temp.path().join("first"));
        let second = FsArtifactStore::new(temp.path().join("second"));
        first.save(&sample_artifacts(0.1)).expect("save");
        second.save(&sample_artifacts(0.7)).expect("save");

        fs::copy(second.model_path(), first.model_path()).expect("copy");
        let err = first.load_model().expect_err("different runs");
        assert!(matches!(err, StorageError::Corrupt { ref reason, .. } if reason.contains("run")));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_artifacts(0.1)).expect("save");

        let path = store.model_path();
        let mut bytes = fs::read(&path).expect("read");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).expect("write");

        let err = store.load_model().expect_err("checksum must fail");
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_artifacts(0.1)).expect("save");
        fs::write(store.scaler_path(), b"not an artifact").expect("write");
        assert!(matches!(
            store.load_model(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_swapped_artifacts_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&sample_artifacts(0.1)).expect("save");
        fs::copy(store.model_path(), store.scaler_path()).expect("copy");
        assert!(matches!(
            store.load_model(),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
