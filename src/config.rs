//! Configuration management for churn inference

use crate::feature_reconciler::CategoricalSchema;
use crate::types::prediction::RiskLevelThresholds;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing model artifacts
    pub models_dir: String,
    /// Model names tried in order at startup; the first that loads is served
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    /// Companion column-order files tried after `<model>_feature_names.json`
    #[serde(default = "default_feature_names_files")]
    pub feature_names_files: Vec<String>,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_candidates() -> Vec<String> {
    vec![
        "best_xgboost_model".to_string(),
        "best_model_random_forest".to_string(),
    ]
}

fn default_feature_names_files() -> Vec<String> {
    vec!["feature_names.json".to_string()]
}

fn default_onnx_threads() -> usize {
    1
}

/// Categorical encoding used at training time
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub categorical: CategoricalSchema,
}

/// Risk tier configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub risk_levels: RiskLevelThresholds,
}

/// Request size limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum records per batch call
    pub max_batch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file if present, else built-in defaults.
    pub fn load() -> Result<Self> {
        let path = Path::new("config/config.toml");
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path, with `CHURN__SECTION__KEY`
    /// environment variables taking precedence.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.models.candidates.is_empty() {
            anyhow::bail!("models.candidates must name at least one model");
        }
        if !self.detection.risk_levels.is_valid() {
            anyhow::bail!(
                "detection.risk_levels must increase strictly within (0, 1]: {:?}",
                self.detection.risk_levels
            );
        }
        if self.limits.max_batch_size == 0 {
            anyhow::bail!("limits.max_batch_size must be positive");
        }
        if self
            .features
            .categorical
            .fields
            .iter()
            .any(|f| f.levels.is_empty())
        {
            anyhow::bail!("every categorical field needs at least one level");
        }
        Ok(())
    }
}

/// `CHURN__SECTION__KEY` variables; list keys take comma separated values.
fn environment() -> Environment {
    Environment::with_prefix("CHURN")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("models.candidates")
        .with_list_parse_key("models.feature_names_files")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                models_dir: "models".to_string(),
                candidates: default_candidates(),
                feature_names_files: default_feature_names_files(),
                onnx_threads: default_onnx_threads(),
            },
            features: FeaturesConfig::default(),
            detection: DetectionConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
