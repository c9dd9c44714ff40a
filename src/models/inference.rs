//! Inference adapter for churn prediction

use crate::config::AppConfig;
use crate::error::{ChurnError, Result};
use crate::feature_reconciler::{FeatureReconciler, FeatureSchema};
use crate::models::estimator::{Estimator, DECISION_THRESHOLD};
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::types::prediction::{PredictionResult, RiskLevel, RiskLevelThresholds};
use crate::types::record::{FeatureMatrix, ReconcileInput};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info};

/// Tolerance for class probabilities that must sum to one.
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Immutable wrapper around one loaded estimator and its schema.
///
/// Every prediction is a pure function of the adapter and the input, so a
/// single instance can be shared across threads behind an `Arc`.
pub struct InferenceAdapter {
    model_name: String,
    estimator: Box<dyn Estimator>,
    schema: Option<FeatureSchema>,
    reconciler: FeatureReconciler,
    risk_thresholds: RiskLevelThresholds,
    loaded_at: DateTime<Utc>,
}

impl InferenceAdapter {
    pub fn new(
        model_name: impl Into<String>,
        estimator: Box<dyn Estimator>,
        schema: Option<FeatureSchema>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            estimator,
            schema,
            reconciler: FeatureReconciler::default(),
            risk_thresholds: RiskLevelThresholds::default(),
            loaded_at: Utc::now(),
        }
    }

    pub fn with_reconciler(mut self, reconciler: FeatureReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn with_risk_thresholds(mut self, thresholds: RiskLevelThresholds) -> Self {
        self.risk_thresholds = thresholds;
        self
    }

    /// Load a named model from a directory with default settings.
    pub fn load_model(name: &str, models_dir: impl AsRef<Path>) -> Result<Self> {
        let loaded = ModelLoader::default().load_model(name, models_dir.as_ref())?;
        Ok(Self::from_loaded(loaded))
    }

    /// Try the configured candidates in order and wrap the first that loads.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::from_config(&config.models);
        let loaded = loader.load_first(
            &config.models.candidates,
            Path::new(&config.models.models_dir),
        )?;

        info!(
            model = %loaded.name,
            path = %loaded.path.display(),
            reconciliation = loaded.schema.is_some(),
            "Inference adapter initialized"
        );

        Ok(Self::from_loaded(loaded)
            .with_reconciler(FeatureReconciler::new(
                config.features.categorical.clone(),
            ))
            .with_risk_thresholds(config.detection.risk_levels.clone()))
    }

    fn from_loaded(loaded: LoadedModel) -> Self {
        Self::new(loaded.name, loaded.estimator, loaded.schema)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_kind(&self) -> &str {
        self.estimator.kind()
    }

    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn risk_thresholds(&self) -> &RiskLevelThresholds {
        &self.risk_thresholds
    }

    /// Number of features the model consumes, when known.
    pub fn feature_count(&self) -> Option<usize> {
        self.schema
            .as_ref()
            .map(FeatureSchema::len)
            .or_else(|| self.estimator.n_features())
    }

    /// Reconcile input into the model's feature layout.
    pub fn prepare(&self, input: &ReconcileInput) -> Result<FeatureMatrix> {
        let features = self.reconciler.reconcile(input, self.schema.as_ref())?;

        if let Some(width) = self.estimator.n_features() {
            if features.n_rows() > 0 && features.n_columns() != width {
                return Err(ChurnError::SchemaMismatch(format!(
                    "model {} expects {} features, input has {}",
                    self.model_name,
                    width,
                    features.n_columns()
                )));
            }
        }
        Ok(features)
    }

    /// Binary label per record, in input order.
    pub fn predict_labels(&self, input: &ReconcileInput) -> Result<Vec<u8>> {
        let features = self.prepare(input)?;
        self.estimator.predict_labels(&features)
    }

    /// `[P(no churn), P(churn)]` per record, in input order.
    pub fn predict_probabilities(&self, input: &ReconcileInput) -> Result<Vec<[f64; 2]>> {
        let features = self.prepare(input)?;
        self.class_probabilities(&features)
    }

    /// Label, probabilities, confidence and risk tier per record.
    pub fn predict_with_details(&self, input: &ReconcileInput) -> Result<Vec<PredictionResult>> {
        let features = self.prepare(input)?;
        let probabilities = self.class_probabilities(&features)?;

        let results: Vec<PredictionResult> = probabilities
            .into_iter()
            .map(|probs| {
                let label = u8::from(probs[1] > DECISION_THRESHOLD);
                PredictionResult::new(label, probs, &self.risk_thresholds)
            })
            .collect();

        debug!(
            model = %self.model_name,
            records = results.len(),
            "Prediction complete"
        );

        Ok(results)
    }

    /// Bucket a churn probability with this adapter's thresholds.
    pub fn risk_level(&self, churn_probability: f64) -> RiskLevel {
        RiskLevel::from_probability(churn_probability, &self.risk_thresholds)
    }

    fn class_probabilities(&self, features: &FeatureMatrix) -> Result<Vec<[f64; 2]>> {
        let churn = self.estimator.churn_probabilities(features)?;

        if churn.len() != features.n_rows() {
            return Err(ChurnError::Inference(format!(
                "model returned {} probabilities for {} rows",
                churn.len(),
                features.n_rows()
            )));
        }

        churn
            .into_iter()
            .map(|p| {
                if !p.is_finite() || p < -PROBABILITY_TOLERANCE || p > 1.0 + PROBABILITY_TOLERANCE {
                    return Err(ChurnError::Inference(format!(
                        "model returned invalid probability {p}"
                    )));
                }
                let p = p.clamp(0.0, 1.0);
                Ok([1.0 - p, p])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::models::linear::LogisticModel;
    use crate::test_support::{
        customer_columns, customer_schema, sample_customer, temp_dir, write_logistic_model,
        ColumnEstimator,
    };
    use crate::types::prediction::PredictionLabel;
    use crate::types::record::Record;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Probability equals the risk_score column.
    fn risk_score_adapter() -> InferenceAdapter {
        let column = customer_columns()
            .iter()
            .position(|c| c == "risk_score")
            .unwrap();
        InferenceAdapter::new(
            "stub",
            Box::new(ColumnEstimator {
                column,
                scale: 1.0,
                width: None,
            }),
            Some(customer_schema()),
        )
    }

    fn customer_with_risk(risk: f64) -> Record {
        let mut customer = sample_customer();
        customer.risk_score = Some(risk);
        customer.to_record()
    }

    #[test]
    fn test_labels_preserve_order_and_length() {
        let adapter = risk_score_adapter();
        let input: ReconcileInput = vec![
            customer_with_risk(0.9),
            customer_with_risk(0.1),
            customer_with_risk(0.7),
        ]
        .into();

        assert_eq!(adapter.predict_labels(&input).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_probability_rows_sum_to_one() {
        let adapter = risk_score_adapter();
        let input: ReconcileInput = vec![customer_with_risk(0.25), customer_with_risk(0.8)].into();

        let probs = adapter.predict_probabilities(&input).unwrap();
        assert_eq!(probs.len(), 2);
        for row in &probs {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-9);
        }
        assert!((probs[0][1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_details_follow_risk_tiers() {
        let adapter = risk_score_adapter();
        let risks = [0.1, 0.45, 0.65, 0.95];
        let input: ReconcileInput = risks
            .iter()
            .map(|r| customer_with_risk(*r))
            .collect::<Vec<_>>()
            .into();

        let results = adapter.predict_with_details(&input).unwrap();
        let tiers: Vec<RiskLevel> = results.iter().map(|r| r.risk_level).collect();
        assert_eq!(
            tiers,
            vec![
                RiskLevel::Low,
                RiskLevel::Medium,
                RiskLevel::High,
                RiskLevel::Critical
            ]
        );

        for result in &results {
            assert!((0.0..=1.0).contains(&result.churn_probability));
            assert!((0.0..=1.0).contains(&result.confidence));
            if result.churn_probability <= 0.5 {
                assert!(result.confidence >= result.churn_probability);
            } else {
                assert!((result.confidence - result.churn_probability).abs() < 1e-12);
            }
        }
        assert_eq!(results[0].prediction_label, PredictionLabel::NotChurned);
        assert_eq!(results[3].prediction_label, PredictionLabel::Churned);
    }

    #[test]
    fn test_reference_customer_example() {
        let dir = temp_dir("adapter");
        write_logistic_model(&dir, "best_xgboost_model", true);
        let adapter = InferenceAdapter::load_model("best_xgboost_model", &dir).unwrap();

        let input = ReconcileInput::from_json(&json!({
            "credit_score": 650, "Geography": "France", "Gender": "Female", "Age": 42,
            "loan_age_years": 2, "outstanding_loan_balance": 0, "num_bank_products": 1,
            "has_credit_card": 1, "online_banking_active": 1, "annual_income": 101348.88
        }))
        .unwrap();

        let result = &adapter.predict_with_details(&input).unwrap()[0];
        assert!(matches!(
            result.prediction_label,
            PredictionLabel::Churned | PredictionLabel::NotChurned
        ));
        assert_eq!(
            result.risk_level,
            adapter.risk_level(result.churn_probability)
        );
        // risk_score backfilled with 0 drives the logistic score to sigmoid(-5)
        assert!(result.churn_probability < 0.01);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_scalar_input_yields_input_error() {
        let err = ReconcileInput::from_json(&json!(3.5)).unwrap_err();
        let err: ChurnError = err.into();
        assert!(matches!(
            err,
            ChurnError::Input(InputError::UnsupportedInputType(_))
        ));
    }

    #[test]
    fn test_malformed_batch_fails_whole_call() {
        let adapter = risk_score_adapter();
        let bad = Record::new().with_text("Geography", "Atlantis");
        let input: ReconcileInput = vec![customer_with_risk(0.2), bad].into();

        assert!(matches!(
            adapter.predict_with_details(&input),
            Err(ChurnError::Input(InputError::InvalidCategory { .. }))
        ));
    }

    #[test]
    fn test_without_schema_width_mismatch() {
        let adapter = InferenceAdapter::new(
            "bare",
            Box::new(LogisticModel::new(0.0, vec![0.1; 16])),
            None,
        );
        let input: ReconcileInput = Record::new().with_number("Age", 42.0).into();

        assert!(matches!(
            adapter.predict_labels(&input),
            Err(ChurnError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_invalid_probability_is_inference_error() {
        let adapter = InferenceAdapter::new(
            "broken",
            Box::new(ColumnEstimator {
                column: 0,
                scale: f64::NAN,
                width: None,
            }),
            None,
        );
        let input: ReconcileInput = Record::new().with_number("x", 1.0).into();

        assert!(matches!(
            adapter.predict_probabilities(&input),
            Err(ChurnError::Inference(_))
        ));
    }

    /// Fixed 0.7 churn probability, counting model runs.
    struct CountingEstimator {
        runs: Arc<AtomicUsize>,
    }

    impl Estimator for CountingEstimator {
        fn kind(&self) -> &str {
            "counting"
        }

        fn churn_probabilities(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.7; features.n_rows()])
        }
    }

    #[test]
    fn test_details_run_model_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let adapter = InferenceAdapter::new(
            "counting",
            Box::new(CountingEstimator { runs: runs.clone() }),
            None,
        );
        let input: ReconcileInput = vec![
            Record::new().with_number("x", 1.0),
            Record::new().with_number("x", 2.0),
        ]
        .into();

        let results = adapter.predict_with_details(&input).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.prediction == 1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_feature_count() {
        assert_eq!(
            risk_score_adapter().feature_count(),
            Some(customer_columns().len())
        );
    }
}
