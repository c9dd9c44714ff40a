//! Model artifact loader

use crate::config::ModelsConfig;
use crate::error::{ChurnError, ModelError, Result};
use crate::feature_reconciler::FeatureSchema;
use crate::models::estimator::Estimator;
use crate::models::linear::LogisticModel;
use crate::models::onnx::OnnxEstimator;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// On-disk artifact formats, probed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Onnx,
    LogisticJson,
}

impl ArtifactFormat {
    const PROBE_ORDER: [ArtifactFormat; 2] = [ArtifactFormat::Onnx, ArtifactFormat::LogisticJson];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Onnx => "onnx",
            ArtifactFormat::LogisticJson => "json",
        }
    }
}

/// Loaded estimator with its training-time schema
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// Artifact file the estimator was read from
    pub path: PathBuf,
    pub estimator: Box<dyn Estimator>,
    /// Column order the model was fit on; `None` disables reconciliation
    pub schema: Option<FeatureSchema>,
}

/// Loader for model artifacts and their companion column lists
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    /// Fallback companion file names, tried after `<model>_feature_names.json`
    feature_names_files: Vec<String>,
}

impl ModelLoader {
    pub fn new(onnx_threads: usize, feature_names_files: Vec<String>) -> Self {
        Self {
            onnx_threads,
            feature_names_files,
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self::new(config.onnx_threads, config.feature_names_files.clone())
    }

    /// Locate the artifact for `name` inside `models_dir`.
    pub fn resolve_artifact(
        &self,
        name: &str,
        models_dir: &Path,
    ) -> std::result::Result<(PathBuf, ArtifactFormat), ModelError> {
        ArtifactFormat::PROBE_ORDER
            .iter()
            .map(|format| (models_dir.join(format!("{name}.{}", format.extension())), *format))
            .find(|(path, _)| path.is_file())
            .ok_or_else(|| ModelError::NotFound {
                name: name.to_string(),
                dir: models_dir.to_path_buf(),
            })
    }

    /// Locate the companion column-order file, if any.
    pub fn find_schema_file(&self, name: &str, models_dir: &Path) -> Option<PathBuf> {
        std::iter::once(format!("{name}_feature_names.json"))
            .chain(self.feature_names_files.iter().cloned())
            .map(|file| models_dir.join(file))
            .find(|path| path.is_file())
    }

    /// Load a single named model and, if present, its column order.
    pub fn load_model(&self, name: &str, models_dir: &Path) -> Result<LoadedModel> {
        let (path, format) = self.resolve_artifact(name, models_dir)?;

        info!(model = %name, path = %path.display(), ?format, "Loading model");

        let estimator: Box<dyn Estimator> = match format {
            ArtifactFormat::Onnx => Box::new(
                OnnxEstimator::from_file(&path, self.onnx_threads).map_err(|e| load_error(name, e))?,
            ),
            ArtifactFormat::LogisticJson => {
                Box::new(LogisticModel::from_file(&path).map_err(|e| load_error(name, e))?)
            }
        };

        let schema = match self.find_schema_file(name, models_dir) {
            Some(schema_path) => Some(load_schema(name, &schema_path)?),
            None => {
                warn!(
                    model = %name,
                    "No feature names file found, input columns will be used as given"
                );
                None
            }
        };

        if let (Some(schema), Some(width)) = (&schema, estimator.n_features()) {
            if schema.len() != width {
                return Err(ChurnError::SchemaMismatch(format!(
                    "model {name} expects {width} features but its schema lists {}",
                    schema.len()
                )));
            }
        }

        info!(
            model = %name,
            kind = estimator.kind(),
            features = schema.as_ref().map(FeatureSchema::len),
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            path,
            estimator,
            schema,
        })
    }

    /// Try candidates in order and return the first that loads.
    pub fn load_first(&self, candidates: &[String], models_dir: &Path) -> Result<LoadedModel> {
        let mut last_error = None;

        for name in candidates {
            match self.load_model(name, models_dir) {
                Ok(model) => return Ok(model),
                Err(e) => {
                    warn!(model = %name, error = %e, "Failed to load model candidate");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ChurnError::ModelUnavailable(ModelError::NoCandidates)))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new(1, vec!["feature_names.json".to_string()])
    }
}

fn load_error(name: &str, err: anyhow::Error) -> ChurnError {
    ModelError::Load {
        name: name.to_string(),
        reason: format!("{err:#}"),
    }
    .into()
}

/// Read a JSON array of column names.
fn load_schema(name: &str, path: &Path) -> Result<FeatureSchema> {
    let raw = std::fs::read(path).map_err(|e| load_error(name, e.into()))?;
    let columns: Vec<String> = serde_json::from_slice(&raw).map_err(|e| {
        load_error(
            name,
            anyhow::anyhow!("invalid feature names file {}: {}", path.display(), e),
        )
    })?;
    FeatureSchema::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer_columns, temp_dir, write_file, write_logistic_model};

    #[test]
    fn test_missing_model_is_not_found() {
        let dir = temp_dir("loader");
        let err = ModelLoader::default()
            .load_model("best_xgboost_model", &dir)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ChurnError::ModelUnavailable(ModelError::NotFound { ref name, .. }) if name == "best_xgboost_model"
        ));
    }

    #[test]
    fn test_corrupt_model_is_load_error() {
        let dir = temp_dir("loader");
        write_file(&dir, "broken.json", "not a model");
        let err = ModelLoader::default().load_model("broken", &dir).err().unwrap();
        assert!(matches!(
            err,
            ChurnError::ModelUnavailable(ModelError::Load { .. })
        ));
    }

    #[test]
    fn test_schema_companion_file() {
        let dir = temp_dir("loader");
        write_logistic_model(&dir, "with_schema", true);
        write_logistic_model(&dir, "without_schema", false);

        let loader = ModelLoader::default();
        let model = loader.load_model("with_schema", &dir).unwrap();
        assert_eq!(model.schema.unwrap().columns(), customer_columns().as_slice());
        assert_eq!(model.estimator.kind(), "logistic_regression");

        let bare = loader.load_model("without_schema", &dir).unwrap();
        assert!(bare.schema.is_none());
    }

    #[test]
    fn test_shared_feature_names_fallback() {
        let dir = temp_dir("loader");
        write_logistic_model(&dir, "model", false);
        write_file(
            &dir,
            "feature_names.json",
            &serde_json::to_string(&customer_columns()).unwrap(),
        );

        let model = ModelLoader::default().load_model("model", &dir).unwrap();
        assert!(model.schema.is_some());
    }

    #[test]
    fn test_duplicate_schema_is_mismatch() {
        let dir = temp_dir("loader");
        write_file(&dir, "m.json", r#"{"intercept": 0, "coefficients": [1, 1]}"#);
        write_file(&dir, "m_feature_names.json", r#"["Age", "Age"]"#);

        let err = ModelLoader::default().load_model("m", &dir).err().unwrap();
        assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    }

    #[test]
    fn test_schema_width_must_match_model() {
        let dir = temp_dir("loader");
        write_file(&dir, "m.json", r#"{"intercept": 0, "coefficients": [1, 1, 1]}"#);
        write_file(&dir, "m_feature_names.json", r#"["Age", "credit_score"]"#);

        let err = ModelLoader::default().load_model("m", &dir).err().unwrap();
        assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    }

    #[test]
    fn test_load_first_falls_back() {
        let dir = temp_dir("loader");
        write_logistic_model(&dir, "best_model_random_forest", true);
        let candidates = vec![
            "best_xgboost_model".to_string(),
            "best_model_random_forest".to_string(),
        ];

        let model = ModelLoader::default().load_first(&candidates, &dir).unwrap();
        assert_eq!(model.name, "best_model_random_forest");
    }

    #[test]
    fn test_load_first_reports_last_failure() {
        let dir = temp_dir("loader");
        let err = ModelLoader::default()
            .load_first(&["a".to_string(), "b".to_string()], &dir)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ChurnError::ModelUnavailable(ModelError::NotFound { ref name, .. }) if name == "b"
        ));

        let err = ModelLoader::default().load_first(&[], &dir).err().unwrap();
        assert!(matches!(
            err,
            ChurnError::ModelUnavailable(ModelError::NoCandidates)
        ));
    }
}
