//! Classifier trait and common types

use async_trait::async_trait;
use serde_json::{json, Value};
use triage_core::Result;

/// Trait for all inference backends
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given complaint text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Inference output as the hosted API shapes it: `[{label, score}, ...]`.
    ///
    /// Backends that talk to an endpoint return its payload without
    /// normalizing it; the default renders the ranked scores of `classify`.
    async fn classify_raw(&self, text: &str) -> Result<Value> {
        let result = self.classify(text).await?;
        let scores = result
            .metadata
            .all_scores
            .unwrap_or_else(|| vec![(result.label, result.score)]);
        Ok(Value::Array(
            scores
                .into_iter()
                .map(|(label, score)| json!({ "label": label, "score": score }))
                .collect(),
        ))
    }
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Predicted label, already resolved through the department table
    pub label: String,

    /// Confidence score (0.0-1.0)
    pub score: f32,

    /// Additional metadata
    pub metadata: ClassificationMetadata,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            metadata: ClassificationMetadata::default(),
            latency_us: 0,
        }
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default)]
pub struct ClassificationMetadata {
    /// Model name or endpoint
    pub model: Option<String>,

    /// All class scores, highest first
    pub all_scores: Option<Vec<(String, f32)>>,
}
