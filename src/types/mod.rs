//! Type definitions for churn inference

pub mod customer;
pub mod prediction;
pub mod record;

pub use customer::{CustomerRecord, Gender, Geography};
pub use prediction::{
    BatchPrediction, PredictionLabel, PredictionResult, ProbabilityCheck, RiskLevel,
    RiskLevelThresholds,
};
pub use record::{FeatureMatrix, FieldValue, ReconcileInput, Record, Table};
