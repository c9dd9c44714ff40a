//! Model backends, artifact loading and the inference adapter

pub mod estimator;
pub mod inference;
pub mod linear;
pub mod loader;
pub mod onnx;

pub use estimator::{Estimator, DECISION_THRESHOLD};
pub use inference::InferenceAdapter;
pub use linear::LogisticModel;
pub use loader::{ArtifactFormat, LoadedModel, ModelLoader};
pub use onnx::OnnxEstimator;
