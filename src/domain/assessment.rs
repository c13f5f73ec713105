//! Scoring result types.
//!
//! Represents the output of the logistic heart-attack risk model.

use serde::{Deserialize, Serialize};

/// Risk level classification for a heart attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Low risk of a heart attack
    Low,
    /// Moderate risk, monitoring recommended
    Moderate,
    /// High risk, intervention recommended
    High,
}

impl RiskLevel {
    /// Classify a positive-class probability.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            Self::Low
        } else if probability < 0.7 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    /// Short guidance shown next to the score.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Probability below 30%: routine care",
            Self::Moderate => "Probability between 30% and 70%: schedule a cardiology review",
            Self::High => "Probability of 70% or more: refer for urgent cardiac assessment",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Answer to a single scoring request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Probability of the positive (heart-attack) class, 0.0 to 1.0
    pub probability: f64,

    /// Thresholded prediction (0 = no heart attack, 1 = heart attack)
    pub label: u8,

    /// Coarse risk band
    pub risk_level: RiskLevel,

    /// Guidance text for the band
    pub risk_description: String,

    /// Human-readable summary
    pub message: String,
}

impl RiskAssessment {
    /// Interpret a probability against a decision threshold.
    #[must_use]
    pub fn new(probability: f64, threshold: f64) -> Self {
        let risk_level = RiskLevel::from_probability(probability);
        let mut assessment = Self {
            probability,
            label: u8::from(probability >= threshold),
            risk_level,
            risk_description: risk_level.description().to_string(),
            message: String::new(),
        };
        assessment.message = format!(
            "The model predicts a {:.2}% probability of the patient having a heart attack.",
            assessment.percentage()
        );
        assessment
    }

    /// Probability expressed as a percentage.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.probability * 100.0
    }
}
