//! Logistic regression backend serialized as JSON

use crate::error::{ChurnError, Result};
use crate::models::estimator::Estimator;
use crate::types::record::FeatureMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logistic regression coefficients exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub intercept: f64,
    /// One weight per feature column, in training order
    pub coefficients: Vec<f64>,
}

fn default_model_type() -> String {
    "logistic_regression".to_string()
}

impl LogisticModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            model_type: default_model_type(),
            intercept,
            coefficients,
        }
    }

    /// Parse a model file, rejecting artifacts that cannot score anything.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read(path)?;
        let model: LogisticModel = serde_json::from_slice(&raw)?;

        if model.model_type != "logistic_regression" {
            anyhow::bail!("unsupported model_type {:?}", model.model_type);
        }
        if model.coefficients.is_empty() {
            anyhow::bail!("model has no coefficients");
        }
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            anyhow::bail!("model has non-finite weights");
        }
        Ok(model)
    }

    fn score(&self, row: &[f32]) -> f64 {
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, x)| w * *x as f64)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl Estimator for LogisticModel {
    fn kind(&self) -> &str {
        &self.model_type
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn churn_probabilities(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.n_columns() != self.coefficients.len() && features.n_rows() > 0 {
            return Err(ChurnError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.n_columns()
            )));
        }
        Ok(features.rows.iter().map(|row| self.score(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_dir, write_file};

    fn matrix(rows: Vec<Vec<f32>>) -> FeatureMatrix {
        FeatureMatrix {
            columns: vec!["x".into(), "y".into()],
            rows,
        }
    }

    #[test]
    fn test_logistic_scores() {
        let model = LogisticModel::new(0.0, vec![1.0, -1.0]);
        let probs = model
            .churn_probabilities(&matrix(vec![vec![0.0, 0.0], vec![3.0, 0.0], vec![0.0, 3.0]]))
            .unwrap();

        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!(probs[1] > 0.95);
        assert!(probs[2] < 0.05);

        let labels = model
            .predict_labels(&matrix(vec![vec![0.0, 0.0], vec![3.0, 0.0]]))
            .unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_width_mismatch() {
        let model = LogisticModel::new(0.0, vec![1.0, 2.0, 3.0]);
        let err = model
            .churn_probabilities(&matrix(vec![vec![1.0, 1.0]]))
            .unwrap_err();
        assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = temp_dir("linear");
        let good = write_file(&dir, "good.json", r#"{"intercept": -1.0, "coefficients": [0.5]}"#);
        let model = LogisticModel::from_file(&good).unwrap();
        assert_eq!(model.kind(), "logistic_regression");
        assert_eq!(model.n_features(), Some(1));

        let corrupt = write_file(&dir, "corrupt.json", "{not json");
        assert!(LogisticModel::from_file(&corrupt).is_err());

        let empty = write_file(&dir, "empty.json", r#"{"intercept": 0, "coefficients": []}"#);
        assert!(LogisticModel::from_file(&empty).is_err());

        let other = write_file(
            &dir,
            "tree.json",
            r#"{"model_type": "random_forest", "intercept": 0, "coefficients": [1]}"#,
        );
        assert!(LogisticModel::from_file(&other).is_err());
    }
}
