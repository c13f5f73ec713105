//! Patient data types for heart-attack risk prediction.
//!
//! The 13 clinical measurements follow the UCI/Cleveland heart disease
//! column layout. Their order is the order the scaler and classifier were
//! trained on and must never change.

use serde::{Deserialize, Serialize};

use crate::{LifebeatError, Result};

/// Number of clinical features per patient.
pub const FEATURE_COUNT: usize = 13;

/// Name of the label column in the training table.
pub const OUTCOME_COLUMN: &str = "output";

/// Canonical feature names, in model order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Alternative column headers found in public copies of the dataset.
const FEATURE_ALIASES: [(&str, &str); 6] = [
    ("trtbps", "trestbps"),
    ("thalachh", "thalach"),
    ("exng", "exang"),
    ("slp", "slope"),
    ("caa", "ca"),
    ("thall", "thal"),
];

/// Resolve a column header to its position in [`FEATURE_NAMES`].
///
/// Matching is case-insensitive and accepts the known aliases.
#[must_use]
pub fn feature_index(column: &str) -> Option<usize> {
    let column = column.trim().to_ascii_lowercase();
    let canonical = FEATURE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == column)
        .map_or(column.as_str(), |(_, name)| name);
    FEATURE_NAMES.iter().position(|name| *name == canonical)
}

/// Clinical measurements for one patient.
///
/// All fields are required; deserialization rejects missing fields and
/// unknown ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientFeatures {
    /// Age in years
    pub age: f64,

    /// Sex: 1 = male, 0 = female
    pub sex: f64,

    /// Chest pain type (0-3)
    pub cp: f64,

    /// Resting blood pressure in mmHg
    pub trestbps: f64,

    /// Serum cholesterol in mg/dL
    pub chol: f64,

    /// Fasting blood sugar > 120 mg/dL: 0 = no, 1 = yes
    pub fbs: f64,

    /// Resting ECG result (0-2)
    pub restecg: f64,

    /// Maximum heart rate achieved
    pub thalach: f64,

    /// Exercise induced angina: 0 = no, 1 = yes
    pub exang: f64,

    /// ST depression induced by exercise relative to rest
    pub oldpeak: f64,

    /// Slope of the peak exercise ST segment (0-2)
    pub slope: f64,

    /// Number of major vessels colored by fluoroscopy (0-4)
    pub ca: f64,

    /// Thalassemia code (0-3)
    pub thal: f64,
}

impl PatientFeatures {
    /// Convert features to a vector in model order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.age,
            self.sex,
            self.cp,
            self.trestbps,
            self.chol,
            self.fbs,
            self.restecg,
            self.thalach,
            self.exang,
            self.oldpeak,
            self.slope,
            self.ca,
            self.thal,
        ]
    }

    /// Create features from a vector in model order.
    ///
    /// # Errors
    /// Returns `Validation` if the vector length is not 13.
    pub fn from_vec(v: &[f64]) -> Result<Self> {
        if v.len() != FEATURE_COUNT {
            return Err(LifebeatError::Validation(format!(
                "Expected {FEATURE_COUNT} features, got {}",
                v.len()
            )));
        }

        Ok(Self {
            age: v[0],
            sex: v[1],
            cp: v[2],
            trestbps: v[3],
            chol: v[4],
            fbs: v[5],
            restecg: v[6],
            thalach: v[7],
            exang: v[8],
            oldpeak: v[9],
            slope: v[10],
            ca: v[11],
            thal: v[12],
        })
    }

    /// Parse a JSON request body.
    ///
    /// # Errors
    /// Returns `Validation` if the body is not a complete feature object.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| LifebeatError::Validation(format!("Malformed feature vector: {e}")))
    }

    /// Validate that all features are finite and within clinical ranges.
    ///
    /// # Errors
    /// Returns all violations as a vector of strings.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, value) in FEATURE_NAMES.iter().zip(self.to_vec()) {
            if !value.is_finite() {
                errors.push(format!("{name} must be a finite number"));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        if !(self.age > 0.0 && self.age <= 120.0) {
            errors.push(format!("Age {} out of range (0, 120]", self.age));
        }
        for (name, value) in [("sex", self.sex), ("fbs", self.fbs), ("exang", self.exang)] {
            if value != 0.0 && value != 1.0 {
                errors.push(format!("{name} {value} must be 0 or 1"));
            }
        }
        for (name, value, max) in [
            ("cp", self.cp, 3.0),
            ("restecg", self.restecg, 2.0),
            ("slope", self.slope, 2.0),
            ("ca", self.ca, 4.0),
            ("thal", self.thal, 3.0),
        ] {
            if value.fract() != 0.0 || !(0.0..=max).contains(&value) {
                errors.push(format!("{name} {value} must be an integer code in [0, {max}]"));
            }
        }
        if !(self.trestbps > 0.0 && self.trestbps <= 300.0) {
            errors.push(format!(
                "Resting blood pressure {} out of range (0, 300]",
                self.trestbps
            ));
        }
        if !(self.chol > 0.0 && self.chol <= 800.0) {
            errors.push(format!("Cholesterol {} out of range (0, 800]", self.chol));
        }
        if !(self.thalach > 0.0 && self.thalach <= 250.0) {
            errors.push(format!(
                "Max heart rate {} out of range (0, 250]",
                self.thalach
            ));
        }
        if !(0.0..=10.0).contains(&self.oldpeak) {
            errors.push(format!("ST depression {} out of range [0, 10]", self.oldpeak));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_patient() -> PatientFeatures {
        PatientFeatures {
            age: 63.0,
            sex: 1.0,
            cp: 3.0,
            trestbps: 145.0,
            chol: 233.0,
            fbs: 1.0,
            restecg: 0.0,
            thalach: 150.0,
            exang: 0.0,
            oldpeak: 2.3,
            slope: 0.0,
            ca: 0.0,
            thal: 1.0,
        }
    }

    #[test]
    fn test_features_to_vec_keeps_model_order() {
        let vec = reference_patient().to_vec();
        assert_eq!(vec.len(), FEATURE_COUNT);
        assert!((vec[0] - 63.0).abs() < f64::EPSILON);
        assert!((vec[4] - 233.0).abs() < f64::EPSILON);
        assert!((vec[9] - 2.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_features_from_vec() {
        let v = reference_patient().to_vec();
        let features = PatientFeatures::from_vec(&v).expect("Should parse");
        assert_eq!(features, reference_patient());

        let err = PatientFeatures::from_vec(&v[..12]).expect_err("short vector");
        assert!(matches!(err, LifebeatError::Validation(_)));
    }

    #[test]
    fn test_from_json_requires_every_field() {
        let full = serde_json::to_string(&reference_patient()).expect("serialize");
        assert_eq!(
            PatientFeatures::from_json(&full).expect("parse"),
            reference_patient()
        );

        let missing = r#"{"age": 63, "sex": 1}"#;
        assert!(matches!(
            PatientFeatures::from_json(missing),
            Err(LifebeatError::Validation(_))
        ));

        let wrong_type = full.replace("\"chol\":233.0", "\"chol\":\"high\"");
        assert!(PatientFeatures::from_json(&wrong_type).is_err());
    }

    #[test]
    fn test_empty_request_has_no_zero_filled_patient() {
        let err = PatientFeatures::from_json("{}").expect_err("no fields");
        let LifebeatError::Validation(message) = err else {
            panic!("expected a validation error, got {err:?}");
        };
        assert!(message.contains("age"), "{message}");
    }

    #[test]
    fn test_validation() {
        assert!(reference_patient().validate().is_ok());

        let invalid = PatientFeatures {
            sex: 2.0,
            cp: 1.5,
            ..reference_patient()
        };
        let errors = invalid.validate().expect_err("two violations");
        assert_eq!(errors.len(), 2);

        let nan = PatientFeatures {
            chol: f64::NAN,
            ..reference_patient()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_feature_index_accepts_aliases() {
        assert_eq!(feature_index("age"), Some(0));
        assert_eq!(feature_index("trtbps"), Some(3));
        assert_eq!(feature_index("THALACHH"), Some(7));
        assert_eq!(feature_index("thall"), Some(12));
        assert_eq!(feature_index(OUTCOME_COLUMN), None);
    }
}
