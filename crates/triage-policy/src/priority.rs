//! Department and confidence to priority mapping

use triage_core::Priority;

/// Maps a department and model confidence to a routing priority.
///
/// High-risk departments are always `high`. Otherwise confidence strictly
/// above `medium_confidence` is `medium`, anything else `low`.
#[derive(Debug, Clone)]
pub struct PriorityPolicy {
    high_risk: Vec<String>,
    medium_confidence: f32,
}

impl PriorityPolicy {
    /// Create a mapping
    pub fn new<I, S>(high_risk: I, medium_confidence: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            high_risk: high_risk.into_iter().map(Into::into).collect(),
            medium_confidence,
        }
    }

    /// Whether the department is in the high-risk set (case-insensitive)
    pub fn is_high_risk(&self, department: &str) -> bool {
        let department = department.trim();
        self.high_risk
            .iter()
            .any(|d| d.eq_ignore_ascii_case(department))
    }

    /// Priority for a department at the given confidence
    pub fn priority(&self, department: &str, confidence: f32) -> Priority {
        if self.is_high_risk(department) {
            Priority::High
        } else if confidence > self.medium_confidence {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}
