//! Churn prediction service
//!
//! Owns the active [`InferenceAdapter`] and exposes the customer-level
//! operations a serving layer needs: typed single and batch prediction,
//! probability-only checks, health and model metadata, and hot reload.

use crate::config::AppConfig;
use crate::error::{ChurnError, InputError, ModelError, Result};
use crate::metrics::InferenceMetrics;
use crate::models::inference::InferenceAdapter;
use crate::types::customer::CustomerRecord;
use crate::types::prediction::{BatchPrediction, PredictionResult, ProbabilityCheck};
use crate::types::record::{ReconcileInput, Record};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info, warn};

/// Service liveness snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// "healthy" when a model is loaded, "degraded" otherwise
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

/// Metadata about the served model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_name: Option<String>,
    pub model_type: Option<String>,
    pub features_count: Option<usize>,
    pub available: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

pub struct ChurnService {
    config: AppConfig,
    adapter: RwLock<Option<Arc<InferenceAdapter>>>,
    metrics: Arc<InferenceMetrics>,
}

impl ChurnService {
    /// Load the first available candidate model.
    ///
    /// A service with no loadable model is still returned; its prediction
    /// calls fail with [`ModelError::NotLoaded`] until a reload succeeds.
    pub fn start(config: AppConfig) -> Self {
        let adapter = match InferenceAdapter::from_config(&config) {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(e) => {
                error!(
                    error = %e,
                    models_dir = %config.models.models_dir,
                    "No model could be loaded, predictions unavailable"
                );
                None
            }
        };

        Self {
            config,
            adapter: RwLock::new(adapter),
            metrics: Arc::new(InferenceMetrics::new()),
        }
    }

    /// Serve an already constructed adapter.
    pub fn from_adapter(config: AppConfig, adapter: InferenceAdapter) -> Self {
        Self {
            config,
            adapter: RwLock::new(Some(Arc::new(adapter))),
            metrics: Arc::new(InferenceMetrics::new()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<InferenceMetrics> {
        self.metrics.clone()
    }

    /// Current adapter. Callers keep it for the whole call even if a reload
    /// swaps in a new one meanwhile.
    pub fn adapter(&self) -> Result<Arc<InferenceAdapter>> {
        self.adapter
            .read()
            .map_err(|e| ChurnError::Inference(format!("adapter lock poisoned: {e}")))?
            .clone()
            .ok_or(ChurnError::ModelUnavailable(ModelError::NotLoaded))
    }

    pub fn is_ready(&self) -> bool {
        self.adapter().is_ok()
    }

    /// Predict churn for one customer.
    pub fn predict_customer(&self, customer: &CustomerRecord) -> Result<PredictionResult> {
        let record = self.observe(prepare_customer(customer))?;
        let mut results = self.predict(&record.into())?;
        results
            .pop()
            .ok_or_else(|| ChurnError::Inference("model returned no prediction".to_string()))
    }

    /// Predict churn for a batch of customers, all or nothing.
    pub fn predict_customers(&self, customers: &[CustomerRecord]) -> Result<BatchPrediction> {
        self.observe(self.check_batch_size(customers.len()))?;

        let records = self.observe(
            customers
                .iter()
                .map(prepare_customer)
                .collect::<Result<Vec<Record>>>(),
        )?;

        let results = if records.is_empty() {
            Vec::new()
        } else {
            self.predict(&records.into())?
        };

        let batch = BatchPrediction::from_results(results);
        info!(
            total = batch.total_customers,
            churned = batch.churned_count,
            churn_rate = batch.churn_rate,
            "Batch prediction complete"
        );
        Ok(batch)
    }

    /// Churn probability and risk tier only.
    pub fn predict_probability(&self, customer: &CustomerRecord) -> Result<ProbabilityCheck> {
        self.predict_customer(customer)
            .map(|result| ProbabilityCheck::from(&result))
    }

    /// Score one JSON object. A complete customer goes through validation and
    /// derived defaults; a partial one is scored as given, with absent
    /// columns zero-filled.
    pub fn predict_json(&self, value: &Value) -> Result<PredictionResult> {
        if let Ok(customer) = serde_json::from_value::<CustomerRecord>(value.clone()) {
            return self.predict_customer(&customer);
        }

        let input = self.observe(ReconcileInput::from_json(value).map_err(ChurnError::from))?;
        if input.len() != 1 {
            return self.observe(Err(InputError::Malformed(format!(
                "expected one customer, got {}",
                input.len()
            ))
            .into()));
        }

        self.predict(&input)?
            .pop()
            .ok_or_else(|| ChurnError::Inference("model returned no prediction".to_string()))
    }

    /// Score untyped input without customer validation or derived defaults.
    pub fn predict(&self, input: &ReconcileInput) -> Result<Vec<PredictionResult>> {
        let start = Instant::now();

        let outcome = self.observe(self.check_batch_size(input.len()).and_then(|_| {
            let adapter = self.adapter()?;
            adapter.predict_with_details(input)
        }));

        if let Ok(results) = &outcome {
            self.metrics.record_call(start.elapsed(), results);
        }
        outcome
    }

    /// Count and log a failed call.
    fn observe<T>(&self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            self.metrics.record_failure();
            warn!(error = %e, class = ?e.class(), "Prediction failed");
        }
        outcome
    }

    /// Re-run candidate selection and swap in the new adapter.
    ///
    /// On failure the previous adapter keeps serving.
    pub fn reload(&self) -> Result<()> {
        let adapter = InferenceAdapter::from_config(&self.config)?;
        let name = adapter.model_name().to_string();

        let mut slot = self
            .adapter
            .write()
            .map_err(|e| ChurnError::Inference(format!("adapter lock poisoned: {e}")))?;
        *slot = Some(Arc::new(adapter));

        info!(model = %name, "Model reloaded");
        Ok(())
    }

    pub fn health(&self) -> HealthReport {
        let model_loaded = self.is_ready();
        HealthReport {
            status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
            model_loaded,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        match self.adapter() {
            Ok(adapter) => ModelInfo {
                model_name: Some(adapter.model_name().to_string()),
                model_type: Some(adapter.model_kind().to_string()),
                features_count: adapter.feature_count(),
                available: true,
                loaded_at: Some(adapter.loaded_at()),
            },
            Err(_) => ModelInfo {
                model_name: None,
                model_type: None,
                features_count: None,
                available: false,
                loaded_at: None,
            },
        }
    }

    fn check_batch_size(&self, size: usize) -> Result<()> {
        let max = self.config.limits.max_batch_size;
        if size > max {
            return Err(InputError::BatchTooLarge { size, max }.into());
        }
        Ok(())
    }
}

fn prepare_customer(customer: &CustomerRecord) -> Result<Record> {
    customer.validate()?;
    Ok(customer.clone().with_derived_defaults().to_record())
}
