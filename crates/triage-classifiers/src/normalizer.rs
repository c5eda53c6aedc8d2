//! Response normalization for hosted inference output
//!
//! Text-classification endpoints answer in a few shapes depending on the
//! serving stack and the number of inputs:
//!
//! ```text
//! [{"label": "LABEL_6", "score": 0.91}, ...]          flat list
//! [[{"label": "LABEL_6", "score": 0.91}, ...]]        nested list (one per input)
//! {"label": "LABEL_6", "score": 0.91}                 single top-1 prediction
//! {"error": "Model is loading"}                       model not ready
//! ```
//!
//! All of them reduce to one top label and its score.

use crate::classifier::{ClassificationMetadata, ClassificationResult};
use serde_json::Value;
use triage_core::{DepartmentTable, Error, Result};

/// Reduce a raw inference payload to its highest-scoring label
pub fn normalize(raw: &Value, departments: &DepartmentTable) -> Result<ClassificationResult> {
    if let Some(message) = error_message(raw) {
        return Err(Error::model_unavailable(message));
    }

    let candidates = match raw {
        Value::Array(items) => match items.first() {
            Some(Value::Array(inner)) => parse_scores(inner, raw)?,
            Some(_) => parse_scores(items, raw)?,
            None => return Err(unexpected(raw)),
        },
        Value::Object(_) => vec![parse_score(raw).ok_or_else(|| unexpected(raw))?],
        _ => return Err(unexpected(raw)),
    };

    let mut ranked: Vec<(String, f32)> = candidates
        .into_iter()
        .map(|(label, score)| (departments.resolve(&label), score))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (label, score) = ranked.first().cloned().ok_or_else(|| unexpected(raw))?;

    Ok(ClassificationResult {
        label,
        score,
        metadata: ClassificationMetadata {
            all_scores: Some(ranked),
            ..Default::default()
        },
        latency_us: 0,
    })
}

/// Text of an `{"error": ...}` body, if that is what the payload is
pub fn error_message(raw: &Value) -> Option<String> {
    match raw.get("error")? {
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_scores(items: &[Value], raw: &Value) -> Result<Vec<(String, f32)>> {
    if items.is_empty() {
        return Err(unexpected(raw));
    }
    items
        .iter()
        .map(|item| parse_score(item).ok_or_else(|| unexpected(raw)))
        .collect()
}

fn parse_score(item: &Value) -> Option<(String, f32)> {
    let label = item.get("label")?.as_str()?;
    let score = item.get("score")?.as_f64()?;
    Some((label.to_string(), score as f32))
}

fn unexpected(raw: &Value) -> Error {
    Error::unexpected_response(raw.to_string())
}
