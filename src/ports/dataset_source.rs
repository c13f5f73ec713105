//! Dataset source port: where the labeled training table comes from.

use crate::domain::LabeledDataset;

/// Trait for loading the training table.
pub trait DatasetSource {
    /// Load all rows with features in model order and 0/1 labels.
    ///
    /// # Errors
    /// Returns `Data` if the source is missing or structurally invalid.
    fn load(&self) -> crate::Result<LabeledDataset>;

    /// Short description for log lines (e.g. the file path).
    fn describe(&self) -> String;
}
