//! ONNX Runtime backend

use crate::error::{ChurnError, Result};
use crate::models::estimator::Estimator;
use crate::types::record::FeatureMatrix;
use anyhow::Context;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// ONNX classifier session with resolved input/output names.
pub struct OnnxEstimator {
    /// Session runs need exclusive access; the estimator itself is never replaced.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    /// Static feature dimension of the input tensor, if declared
    n_features: Option<usize>,
}

impl OnnxEstimator {
    /// Build a session from a model file.
    pub fn from_file(path: &Path, onnx_threads: usize) -> anyhow::Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let n_features = session.inputs.first().and_then(|input| {
            let dims: Vec<i64> = input.input_type.tensor_shape()?.iter().copied().collect();
            static_width(&dims)
        });

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            features = ?n_features,
            threads = onnx_threads,
            "ONNX session ready"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            n_features,
        })
    }

    /// Pull P(churn) per row out of the session outputs.
    ///
    /// Tensor outputs come from XGBoost and random forest exports,
    /// seq(map(int64, float)) outputs from zipmap-style exports.
    fn extract_probabilities(&self, outputs: &SessionOutputs, rows: usize) -> Result<Vec<f64>> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(probs) = probabilities_from_value(&output, rows)? {
                return Ok(probs);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(probs) = probabilities_from_value(&output, rows)? {
                debug!(output = %name, "Extracted probabilities from fallback output");
                return Ok(probs);
            }
        }

        warn!(output = %self.output_name, "No probability output found");
        Err(ChurnError::Inference(
            "model produced no probability output".to_string(),
        ))
    }
}

impl Estimator for OnnxEstimator {
    fn kind(&self) -> &str {
        "onnx"
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn churn_probabilities(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.n_rows() == 0 {
            return Ok(Vec::new());
        }

        let shape = vec![features.n_rows() as i64, features.n_columns() as i64];
        let input = Tensor::from_array((shape, features.flatten())).map_err(ChurnError::inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ChurnError::Inference(format!("session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(ChurnError::inference)?;

        self.extract_probabilities(&outputs, features.n_rows())
    }
}

fn probabilities_from_value(output: &DynValue, rows: usize) -> Result<Option<Vec<f64>>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return churn_column(&dims, data, rows).map(Some);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return probabilities_from_sequence_map(output, rows).map(Some);
    }

    Ok(None)
}

/// Width of a `[batch, features]` input; dynamic (negative) dimensions give `None`.
fn static_width(dims: &[i64]) -> Option<usize> {
    match dims {
        [_, width] if *width > 0 => Some(*width as usize),
        _ => None,
    }
}

/// Select the churn column from a `[rows, classes]`, `[rows, 1]` or `[rows]` tensor.
pub(crate) fn churn_column(dims: &[i64], data: &[f32], rows: usize) -> Result<Vec<f64>> {
    let classes = match dims {
        [n, k] if *n as usize == rows => *k as usize,
        [n] if *n as usize == rows => 1,
        _ => {
            return Err(ChurnError::Inference(format!(
                "unexpected probability shape {dims:?} for {rows} rows"
            )))
        }
    };

    if classes == 0 || data.len() < rows * classes {
        return Err(ChurnError::Inference(format!(
            "probability tensor too small for shape {dims:?}"
        )));
    }

    let column = if classes >= 2 { 1 } else { 0 };
    Ok((0..rows)
        .map(|r| data[r * classes + column] as f64)
        .collect())
}

fn probabilities_from_sequence_map(output: &DynValue, rows: usize) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| ChurnError::Inference(format!("failed to downcast to sequence: {e}")))?;
    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(ChurnError::inference)?;

    if maps.len() != rows {
        return Err(ChurnError::Inference(format!(
            "sequence output has {} entries for {rows} rows",
            maps.len()
        )));
    }

    maps.iter()
        .map(|map_value| {
            let pairs = map_value
                .try_extract_key_values::<i64, f32>()
                .map_err(ChurnError::inference)?;
            if let Some((_, p)) = pairs.iter().find(|(class, _)| *class == 1) {
                return Ok(*p as f64);
            }
            pairs
                .iter()
                .find(|(class, _)| *class == 0)
                .map(|(_, p)| 1.0 - *p as f64)
                .ok_or_else(|| ChurnError::Inference("no class probability in map".to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_width() {
        assert_eq!(static_width(&[-1, 19]), Some(19));
        assert_eq!(static_width(&[1, 19]), Some(19));
        assert_eq!(static_width(&[-1, -1]), None);
        assert_eq!(static_width(&[19]), None);
    }

    #[test]
    fn test_churn_column_two_classes() {
        let data = [0.9, 0.1, 0.25, 0.75];
        let probs = churn_column(&[2, 2], &data, 2).unwrap();
        assert!((probs[0] - 0.1).abs() < 1e-6);
        assert!((probs[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_churn_column_single_output() {
        assert_eq!(churn_column(&[2, 1], &[0.5, 0.25], 2).unwrap(), vec![0.5, 0.25]);
        assert_eq!(churn_column(&[2], &[0.5, 0.25], 2).unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_churn_column_shape_mismatch() {
        assert!(churn_column(&[3, 2], &[0.0; 6], 2).is_err());
        assert!(churn_column(&[2, 2], &[0.0; 3], 2).is_err());
    }
}
