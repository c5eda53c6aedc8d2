//! Policy evaluation engine

use crate::config::{PolicyConfig, UrgencyScale};
use crate::priority::PriorityPolicy;
use crate::rule::{FallbackRule, KeywordRule};
use serde::Serialize;
use triage_core::{Priority, Result};

/// Compiled triage policy
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    confidence_threshold: f32,
    rules: Vec<KeywordRule>,
    default_fallback: FallbackRule,
    priority: PriorityPolicy,
    urgency: UrgencyScale,
}

impl PolicyEngine {
    /// Compile a policy
    pub fn new(config: &PolicyConfig) -> Result<Self> {
        config.validate()?;

        let rules = config
            .fallback_rules
            .iter()
            .cloned()
            .map(KeywordRule::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            confidence_threshold: config.confidence_threshold,
            rules,
            default_fallback: config.default_fallback.clone(),
            priority: PriorityPolicy::new(
                config.high_risk_departments.iter().cloned(),
                config.medium_confidence,
            ),
            urgency: config.urgency,
        })
    }

    /// Decide the final label, priority and urgency for one classification
    pub fn evaluate(&self, label: &str, confidence: f32, text: &str) -> Decision {
        if confidence >= self.confidence_threshold {
            let priority = self.priority.priority(label, confidence);
            return Decision {
                label: label.to_string(),
                model_label: label.to_string(),
                confidence,
                priority,
                urgency_score: self.urgency.score(priority),
                fallback_rule: None,
            };
        }

        let rule = self.fallback(text);
        tracing::debug!(
            model_label = label,
            confidence,
            rule = %rule.name,
            "Confidence below threshold, applying keyword fallback"
        );

        Decision {
            label: rule.label.clone(),
            model_label: label.to_string(),
            confidence,
            priority: self.priority.priority(&rule.label, confidence),
            urgency_score: rule.score,
            fallback_rule: Some(rule.name.clone()),
        }
    }

    /// First keyword rule matching the text, else the default rule
    pub fn fallback(&self, text: &str) -> &FallbackRule {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(KeywordRule::rule)
            .unwrap_or(&self.default_fallback)
    }

    /// Confidence at or above which the model label is kept
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }
}

/// Outcome of policy evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Final label (department / category)
    pub label: String,

    /// Label the model predicted before any override
    pub model_label: String,

    /// Model confidence, unchanged by the policy
    pub confidence: f32,

    /// Routing priority
    pub priority: Priority,

    /// Urgency score for downstream ordering
    pub urgency_score: u8,

    /// Name of the keyword rule that overrode the model, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_rule: Option<String>,
}

impl Decision {
    /// Whether the keyword fallback replaced the model label
    pub fn fallback_applied(&self) -> bool {
        self.fallback_rule.is_some()
    }
}
