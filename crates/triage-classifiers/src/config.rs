//! Inference backend configuration and classifier construction

use crate::classifier::Classifier;
use crate::remote::RemoteInferenceClassifier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use triage_core::{DepartmentTable, Error, Result};

/// Model served by both backends unless configured otherwise
pub const DEFAULT_MODEL_REPO: &str = "midhun-2542/AI_Railway_Model";

/// Which inference backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// Hosted inference endpoint
    #[default]
    Remote,
    /// Model loaded into this process
    Local,
}

/// Configuration for the inference layer
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InferenceConfig {
    /// Selected backend
    #[serde(default)]
    pub backend: InferenceBackend,

    /// Hosted endpoint settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// In-process model settings
    #[serde(default)]
    pub local: LocalModelConfig,

    /// Index-to-department table applied to model labels
    #[serde(default)]
    pub departments: DepartmentTable,
}

/// Hosted endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Full URL of the text-classification endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// In-process model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// HuggingFace repository to download from
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Repository revision
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Load from this directory instead of the hub
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Device to run on (cpu, cuda, metal)
    #[serde(default = "default_device")]
    pub device: String,

    /// Maximum sequence length; longer inputs are truncated
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            revision: default_revision(),
            path: None,
            device: default_device(),
            max_length: default_max_length(),
        }
    }
}

fn default_endpoint() -> String {
    format!("https://router.huggingface.co/hf-inference/models/{}", DEFAULT_MODEL_REPO)
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_repo() -> String {
    DEFAULT_MODEL_REPO.to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_max_length() -> usize {
    512
}

/// Build the configured classifier.
///
/// The hosted backend refuses to start without a token. The local backend uses
/// the token only to download private repositories. Model loading is blocking
/// work and runs on the blocking pool.
pub async fn build_classifier(
    config: &InferenceConfig,
    token: Option<&str>,
) -> Result<Arc<dyn Classifier>> {
    match config.backend {
        InferenceBackend::Remote => {
            let token = token
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| Error::config("HF_TOKEN must be set for the remote inference backend"))?;
            tracing::info!(endpoint = %config.remote.endpoint, "Using hosted inference backend");
            let classifier =
                RemoteInferenceClassifier::new(&config.remote, token, config.departments.clone())?;
            Ok(Arc::new(classifier))
        }
        InferenceBackend::Local => build_local(config, token).await,
    }
}

#[cfg(feature = "ml-models")]
async fn build_local(config: &InferenceConfig, token: Option<&str>) -> Result<Arc<dyn Classifier>> {
    let local = config.local.clone();
    let departments = config.departments.clone();
    let token = token.map(str::to_string);

    tracing::info!(repo = %local.repo, path = ?local.path, "Loading in-process model");

    let classifier = tokio::task::spawn_blocking(move || {
        crate::local::LocalModelClassifier::load(&local, token.as_deref(), departments)
    })
    .await
    .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))??;

    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "ml-models"))]
async fn build_local(_config: &InferenceConfig, _token: Option<&str>) -> Result<Arc<dyn Classifier>> {
    Err(Error::config("the local backend requires the 'ml-models' feature"))
}
