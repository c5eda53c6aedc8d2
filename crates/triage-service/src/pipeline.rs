//! Classification pipeline shared by the HTTP handler and the listener

use serde_json::Value;
use triage_classifiers::Classifier;
use triage_core::{Error, Result};
use triage_policy::{Decision, PolicyEngine};

/// Where a classification request came from, used as a metrics label
#[derive(Debug, Clone, Copy)]
pub enum Source {
    Http,
    Listener,
}

impl Source {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Listener => "listener",
        }
    }
}

/// Run inference and the triage policy over one complaint text
pub async fn triage(
    classifier: &dyn Classifier,
    policy: &PolicyEngine,
    text: &str,
    source: Source,
) -> Result<Decision> {
    metrics::counter!("triage_requests_total", "source" => source.as_str()).increment(1);

    let result = classifier.classify(text).await.map_err(count_error)?;

    metrics::histogram!("triage_inference_latency_us", "classifier" => classifier.name().to_string())
        .record(result.latency_us as f64);

    let decision = policy.evaluate(&result.label, result.score, text);
    if let Some(rule) = &decision.fallback_rule {
        metrics::counter!("triage_fallback_total", "rule" => rule.clone()).increment(1);
    }

    tracing::debug!(
        model_label = %result.label,
        confidence = result.score,
        label = %decision.label,
        priority = %decision.priority,
        urgency = decision.urgency_score,
        "Complaint triaged"
    );

    Ok(decision)
}

/// Run inference only and return the backend's unnormalized output
pub async fn raw(classifier: &dyn Classifier, text: &str, source: Source) -> Result<Value> {
    metrics::counter!("triage_requests_total", "source" => source.as_str()).increment(1);

    let prediction = classifier.classify_raw(text).await.map_err(count_error)?;
    tracing::debug!(classifier = classifier.name(), "Raw inference complete");

    Ok(prediction)
}

fn count_error(err: Error) -> Error {
    metrics::counter!("triage_errors_total", "kind" => err.kind()).increment(1);
    err
}
