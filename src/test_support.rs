//! Shared fixtures for unit tests

use crate::error::{ChurnError, Result};
use crate::feature_reconciler::{CategoricalSchema, FeatureSchema};
use crate::models::estimator::Estimator;
use crate::types::customer::{CustomerRecord, Gender, Geography};
use crate::types::record::FeatureMatrix;
use std::path::{Path, PathBuf};

/// Numeric columns of a customer record in training order.
pub const NUMERIC_COLUMNS: [&str; 14] = [
    "credit_score",
    "Age",
    "loan_age_years",
    "outstanding_loan_balance",
    "num_bank_products",
    "has_credit_card",
    "online_banking_active",
    "annual_income",
    "monthly_income",
    "estimated_property_value",
    "ltv_ratio",
    "payment_to_income_ratio",
    "risk_score",
    "balance_per_product",
];

pub fn sample_customer() -> CustomerRecord {
    CustomerRecord::new(
        650.0,
        Geography::France,
        Gender::Female,
        42,
        2.0,
        0.0,
        1,
        1,
        1,
        101348.88,
    )
}

/// The full training-time schema: numeric columns then indicator columns.
pub fn customer_columns() -> Vec<String> {
    let mut columns: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
    for field in &CategoricalSchema::customer_default().fields {
        columns.extend(field.indicator_columns());
    }
    columns
}

pub fn customer_schema() -> FeatureSchema {
    FeatureSchema::new(customer_columns()).expect("customer schema is duplicate free")
}

/// Scores the churn probability as a fixed function of one column, clamped to [0, 1].
pub struct ColumnEstimator {
    pub column: usize,
    pub scale: f64,
    pub width: Option<usize>,
}

impl Estimator for ColumnEstimator {
    fn kind(&self) -> &str {
        "column_stub"
    }

    fn n_features(&self) -> Option<usize> {
        self.width
    }

    fn churn_probabilities(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        features
            .rows
            .iter()
            .map(|row| {
                row.get(self.column)
                    .map(|v| (*v as f64 * self.scale).clamp(0.0, 1.0))
                    .ok_or_else(|| ChurnError::Inference("column out of range".into()))
            })
            .collect()
    }
}

/// Fresh scratch directory under the system temp dir.
pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// A logistic model over the customer schema driven by the risk_score column.
pub fn write_logistic_model(dir: &Path, name: &str, with_schema: bool) {
    let columns = customer_columns();
    let risk_idx = columns.iter().position(|c| c == "risk_score").unwrap();
    let mut coefficients = vec![0.0; columns.len()];
    coefficients[risk_idx] = 10.0;

    let model = serde_json::json!({
        "model_type": "logistic_regression",
        "intercept": -5.0,
        "coefficients": coefficients,
    });
    write_file(dir, &format!("{name}.json"), &model.to_string());

    if with_schema {
        write_file(
            dir,
            &format!("{name}_feature_names.json"),
            &serde_json::to_string(&columns).unwrap(),
        );
    }
}
