//! Prediction result data structures

use serde::{Deserialize, Serialize};

/// Risk tier derived from churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// All tiers, lowest first.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Bucket a churn probability. Each tier is closed on its lower bound.
    pub fn from_probability(probability: f64, thresholds: &RiskLevelThresholds) -> Self {
        if probability >= thresholds.critical {
            RiskLevel::Critical
        } else if probability >= thresholds.high {
            RiskLevel::High
        } else if probability >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds of the Medium, High and Critical tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl RiskLevelThresholds {
    /// Thresholds must be strictly increasing inside (0, 1].
    pub fn is_valid(&self) -> bool {
        0.0 < self.medium
            && self.medium < self.high
            && self.high < self.critical
            && self.critical <= 1.0
    }
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.30,
            high: 0.60,
            critical: 0.80,
        }
    }
}

/// Human readable form of the binary label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionLabel {
    #[serde(rename = "Churned")]
    Churned,
    #[serde(rename = "Not Churned")]
    NotChurned,
}

impl PredictionLabel {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            PredictionLabel::Churned
        } else {
            PredictionLabel::NotChurned
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionLabel::Churned => "Churned",
            PredictionLabel::NotChurned => "Not Churned",
        }
    }
}

/// Per-customer prediction returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 0 = not churned, 1 = churned
    pub prediction: u8,
    pub prediction_label: PredictionLabel,
    /// P(churn) in [0, 1]
    pub churn_probability: f64,
    /// Probability of the more likely class
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

impl PredictionResult {
    /// Combine a label with its class probabilities `[P(no churn), P(churn)]`.
    pub fn new(label: u8, probabilities: [f64; 2], thresholds: &RiskLevelThresholds) -> Self {
        let churn_probability = probabilities[1];
        Self {
            prediction: label,
            prediction_label: PredictionLabel::from_label(label),
            churn_probability,
            confidence: probabilities[0].max(probabilities[1]),
            risk_level: RiskLevel::from_probability(churn_probability, thresholds),
        }
    }

    pub fn is_churn(&self) -> bool {
        self.prediction == 1
    }
}

/// Batch response with aggregate statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub predictions: Vec<PredictionResult>,
    pub total_customers: usize,
    pub churned_count: usize,
    /// churned_count / total_customers, 0 for an empty batch
    pub churn_rate: f64,
}

impl BatchPrediction {
    pub fn from_results(predictions: Vec<PredictionResult>) -> Self {
        let total_customers = predictions.len();
        let churned_count = predictions.iter().filter(|p| p.is_churn()).count();
        let churn_rate = if total_customers > 0 {
            churned_count as f64 / total_customers as f64
        } else {
            0.0
        };

        Self {
            predictions,
            total_customers,
            churned_count,
            churn_rate,
        }
    }

    /// Count of predictions per risk tier, lowest tier first.
    pub fn risk_distribution(&self) -> [(RiskLevel, usize); 4] {
        RiskLevel::ALL.map(|level| {
            let count = self
                .predictions
                .iter()
                .filter(|p| p.risk_level == level)
                .count();
            (level, count)
        })
    }
}

/// Probability-only answer for quick checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityCheck {
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
}

impl From<&PredictionResult> for ProbabilityCheck {
    fn from(result: &PredictionResult) -> Self {
        Self {
            churn_probability: result.churn_probability,
            risk_level: result.risk_level,
        }
    }
}
