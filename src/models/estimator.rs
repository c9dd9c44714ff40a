//! Estimator interface shared by all model backends

use crate::error::Result;
use crate::types::record::FeatureMatrix;

/// Probability above which a row is labelled as churn.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// A loaded, immutable binary classifier.
pub trait Estimator: Send + Sync {
    /// Short identifier of the backend, e.g. `onnx` or `logistic_regression`.
    fn kind(&self) -> &str;

    /// Input width the estimator was fit on, when the artifact declares it.
    fn n_features(&self) -> Option<usize> {
        None
    }

    /// P(churn) for every row, in row order.
    fn churn_probabilities(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Binary labels for every row. Ties go to the negative class.
    fn predict_labels(&self, features: &FeatureMatrix) -> Result<Vec<u8>> {
        Ok(self
            .churn_probabilities(features)?
            .into_iter()
            .map(|p| u8::from(p > DECISION_THRESHOLD))
            .collect())
    }
}
