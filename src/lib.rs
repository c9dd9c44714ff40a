//! Churn Inference Library
//!
//! Serves mortgage churn predictions from a pre-trained classifier:
//! heterogeneous customer input is reconciled into the training-time
//! feature layout, scored by an ONNX or logistic regression model, and
//! returned with a probability, confidence and risk tier.

pub mod config;
pub mod error;
pub mod feature_reconciler;
pub mod metrics;
pub mod models;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use error::{ChurnError, ErrorClass, InputError, ModelError, Result};
pub use feature_reconciler::{CategoricalSchema, FeatureReconciler, FeatureSchema};
pub use models::inference::InferenceAdapter;
pub use service::{ChurnService, HealthReport, ModelInfo};
pub use types::{
    customer::CustomerRecord,
    prediction::{BatchPrediction, PredictionResult, RiskLevel},
    record::ReconcileInput,
};
