//! Complaint classifiers
//!
//! Every inference backend implements the [`Classifier`] trait:
//! - [`RemoteInferenceClassifier`] posts the text to a hosted inference endpoint
//! - `LocalModelClassifier` (feature `ml-models`) runs a BERT-family model in-process
//!
//! Raw inference output is reduced to a single top label by the [`normalizer`].

pub mod classifier;
pub mod config;
#[cfg(feature = "ml-models")]
pub mod local;
pub mod normalizer;
pub mod remote;

pub use classifier::{ClassificationMetadata, ClassificationResult, Classifier};
pub use config::{build_classifier, InferenceBackend, InferenceConfig, LocalModelConfig, RemoteConfig};
#[cfg(feature = "ml-models")]
pub use local::LocalModelClassifier;
pub use normalizer::normalize;
pub use remote::RemoteInferenceClassifier;
