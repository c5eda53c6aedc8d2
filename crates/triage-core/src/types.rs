//! Core request and priority types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Complaint payload accepted by the classify endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintData {
    /// Free-text complaint description
    pub text: String,
}

/// Routing priority derived from a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Lower-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_serializes_lowercase() {
        let json = serde_json::to_string(&Priority::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }

    #[test]
    fn test_priority_display_matches_wire_name() {
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(Priority::Low.as_str(), "low");
    }

    #[test]
    fn test_complaint_data_deserialization() {
        let data: ComplaintData = serde_json::from_str(r#"{"text": "fan not working"}"#).unwrap();
        assert_eq!(data.text, "fan not working");
    }
}
