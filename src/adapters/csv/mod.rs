//! CSV adapter: Implementation of DatasetSource.
//!
//! Reads a comma-separated table with a header row. Feature columns are
//! located by name (see [`feature_index`]) and reordered into model
//! order; the `output` column holds the 0/1 label; any other column is
//! ignored.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{feature_index, LabeledDataset, FEATURE_COUNT, FEATURE_NAMES, OUTCOME_COLUMN};
use crate::ports::DatasetSource;
use crate::{LifebeatError, Result};

/// Training table stored as a CSV file.
#[derive(Debug, Clone)]
pub struct CsvDataset {
    path: PathBuf,
}

impl CsvDataset {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for CsvDataset {
    fn load(&self) -> Result<LabeledDataset> {
        if !self.path.is_file() {
            tracing::error!("Dataset not found at: {:?}", self.path);
            return Err(LifebeatError::Data(format!(
                "Dataset not found at: {}",
                self.path.display()
            )));
        }
        let content = fs::read_to_string(&self.path)?;
        parse_csv(&content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Column positions of the features (model order) and the label.
struct Layout {
    features: [usize; FEATURE_COUNT],
    outcome: usize,
    width: usize,
}

/// Split a line into cells without surrounding whitespace or quotes.
fn split_cells(line: &str) -> Vec<&str> {
    line.split(',').map(|c| c.trim().trim_matches('"').trim()).collect()
}

fn parse_header(header: &str) -> Result<Layout> {
    let columns = split_cells(header);

    let mut features = [usize::MAX; FEATURE_COUNT];
    let mut outcome = None;
    for (position, name) in columns.iter().enumerate() {
        if name.eq_ignore_ascii_case(OUTCOME_COLUMN) {
            outcome = Some(position);
        } else if let Some(idx) = feature_index(name) {
            if features[idx] != usize::MAX {
                return Err(LifebeatError::Data(format!(
                    "Column '{}' appears more than once",
                    FEATURE_NAMES[idx]
                )));
            }
            features[idx] = position;
        }
    }

    let outcome = outcome.ok_or_else(|| {
        LifebeatError::Data(format!("Outcome column '{OUTCOME_COLUMN}' not found"))
    })?;
    let missing: Vec<&str> = FEATURE_NAMES
        .iter()
        .zip(&features)
        .filter(|(_, &pos)| pos == usize::MAX)
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(LifebeatError::Data(format!(
            "Missing feature columns: {}",
            missing.join(", ")
        )));
    }

    Ok(Layout {
        features,
        outcome,
        width: columns.len(),
    })
}

/// Parse CSV text into a labeled dataset.
///
/// # Errors
/// Returns `Data` for a missing header, missing columns, ragged or
/// non-numeric rows, labels outside {0, 1}, or an empty table.
pub fn parse_csv(content: &str) -> Result<LabeledDataset> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| LifebeatError::Data("Dataset is empty".to_string()))?;
    let layout = parse_header(header.trim_start_matches('\u{feff}'))?;

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for (i, line) in lines {
        let line_no = i + 1;
        let cells = split_cells(line);
        if cells.len() != layout.width {
            return Err(LifebeatError::Data(format!(
                "Line {line_no}: expected {} fields, found {}",
                layout.width,
                cells.len()
            )));
        }

        let parse = |position: usize| -> Result<f64> {
            let value: f64 = cells[position].parse().map_err(|_| {
                LifebeatError::Data(format!(
                    "Line {line_no}: '{}' is not a number",
                    cells[position]
                ))
            })?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(LifebeatError::Data(format!(
                    "Line {line_no}: non-finite value"
                )))
            }
        };

        let row = layout
            .features
            .iter()
            .map(|&position| parse(position))
            .collect::<Result<Vec<f64>>>()?;
        let label = match parse(layout.outcome)? {
            v if v == 0.0 => 0,
            v if v == 1.0 => 1,
            v => {
                return Err(LifebeatError::Data(format!(
                    "Line {line_no}: outcome must be 0 or 1, found {v}"
                )))
            }
        };

        rows.push(row);
        labels.push(label);
    }

    if rows.is_empty() {
        return Err(LifebeatError::Data(
            "Dataset has a header but no rows".to_string(),
        ));
    }
    tracing::debug!("Parsed {} rows from CSV", rows.len());
    LabeledDataset::new(rows, labels)
}
