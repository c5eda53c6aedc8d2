//! Hosted inference client
//!
//! Posts `{"inputs": text}` with a bearer token and normalizes the answer.

use crate::classifier::{ClassificationResult, Classifier};
use crate::config::RemoteConfig;
use crate::normalizer::{error_message, normalize};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use triage_core::{DepartmentTable, Error, Result};

/// Classifier backed by a hosted text-classification endpoint
pub struct RemoteInferenceClassifier {
    name: String,
    endpoint: String,
    token: String,
    client: reqwest::Client,
    departments: DepartmentTable,
}

impl RemoteInferenceClassifier {
    /// Create a client for `config.endpoint` authenticated with `token`
    pub fn new(
        config: &RemoteConfig,
        token: impl Into<String>,
        departments: DepartmentTable,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("an inference token is required for the remote backend"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: format!("remote:{}", config.endpoint),
            endpoint: config.endpoint.clone(),
            token,
            client,
            departments,
        })
    }

    /// Endpoint this client posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn infer(&self, text: &str) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Inference endpoint returned an error status");
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                if let Some(message) = serde_json::from_str::<Value>(&body)
                    .ok()
                    .as_ref()
                    .and_then(error_message)
                {
                    return Err(Error::model_unavailable(message));
                }
            }
            return Err(Error::upstream(status.as_u16(), body));
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|_| Error::unexpected_response(body.clone()))?;

        if let Some(message) = error_message(&raw) {
            return Err(Error::model_unavailable(message));
        }

        Ok(raw)
    }
}

#[async_trait]
impl Classifier for RemoteInferenceClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let raw = self.infer(text).await?;
        let mut result = normalize(&raw, &self.departments)?;

        result.metadata.model = Some(self.name.clone());
        result.latency_us = start.elapsed().as_micros() as u64;

        tracing::debug!(
            label = %result.label,
            score = result.score,
            latency_us = result.latency_us,
            "Remote classification complete"
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn classify_raw(&self, text: &str) -> Result<Value> {
        self.infer(text).await
    }
}

/// Connection failures carry no upstream status; report them as a gateway error
fn transport_error(err: reqwest::Error) -> Error {
    let status = if err.is_timeout() { 504 } else { 502 };
    Error::upstream(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_rejected() {
        let config = RemoteConfig::default();
        let result = RemoteInferenceClassifier::new(&config, "  ", DepartmentTable::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_name_includes_endpoint() {
        let config = RemoteConfig {
            endpoint: "http://127.0.0.1:9/classify".to_string(),
            ..Default::default()
        };
        let classifier =
            RemoteInferenceClassifier::new(&config, "hf_test", DepartmentTable::default()).unwrap();
        assert_eq!(classifier.name(), "remote:http://127.0.0.1:9/classify");
        assert_eq!(classifier.endpoint(), "http://127.0.0.1:9/classify");
    }
}
