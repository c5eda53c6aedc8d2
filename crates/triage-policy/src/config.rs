//! Policy configuration

use crate::rule::FallbackRule;
use serde::{Deserialize, Serialize};
use std::path::Path;
use triage_core::{Error, Priority, Result};

/// Complete triage policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Model confidence at or above which the model label is trusted
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Confidence strictly above which a non-high-risk department is `medium`
    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f32,

    /// Departments that are always `high` priority
    #[serde(default = "default_high_risk")]
    pub high_risk_departments: Vec<String>,

    /// Keyword rules, evaluated in order, first match wins
    #[serde(default = "default_fallback_rules")]
    pub fallback_rules: Vec<FallbackRule>,

    /// Applied when no keyword rule matches
    #[serde(default = "default_fallback")]
    pub default_fallback: FallbackRule,

    /// Urgency scores for trusted model decisions
    #[serde(default)]
    pub urgency: UrgencyScale,
}

impl PolicyConfig {
    /// Load a policy from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::policy(format!("Failed to parse policy: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a policy from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("medium_confidence", self.medium_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::policy(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            medium_confidence: default_medium_confidence(),
            high_risk_departments: default_high_risk(),
            fallback_rules: default_fallback_rules(),
            default_fallback: default_fallback(),
            urgency: UrgencyScale::default(),
        }
    }
}

/// Urgency score per priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyScale {
    #[serde(default = "default_high_urgency")]
    pub high: u8,
    #[serde(default = "default_medium_urgency")]
    pub medium: u8,
    #[serde(default = "default_low_urgency")]
    pub low: u8,
}

impl UrgencyScale {
    /// Score for a priority
    pub fn score(&self, priority: Priority) -> u8 {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

impl Default for UrgencyScale {
    fn default() -> Self {
        Self {
            high: default_high_urgency(),
            medium: default_medium_urgency(),
            low: default_low_urgency(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.6
}

fn default_medium_confidence() -> f32 {
    0.85
}

fn default_high_risk() -> Vec<String> {
    vec![
        "Medical".to_string(),
        "Security".to_string(),
        "Emergency".to_string(),
    ]
}

fn default_fallback_rules() -> Vec<FallbackRule> {
    vec![
        FallbackRule::new("emergency", "Emergency", ["urgent", "emergency"], 90),
        FallbackRule::new("security", "Security", ["security"], 80),
        FallbackRule::new("maintenance", "Maintenance", ["clean", "maintenance"], 50),
    ]
}

fn default_fallback() -> FallbackRule {
    FallbackRule::new("inquiry", "Inquiry", Vec::<String>::new(), 30)
}

fn default_high_urgency() -> u8 {
    95
}

fn default_medium_urgency() -> u8 {
    70
}

fn default_low_urgency() -> u8 {
    35
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = PolicyConfig::from_yaml("{}").unwrap();
        assert_eq!(config, PolicyConfig::default());
        assert_eq!(config.fallback_rules.len(), 3);
        assert_eq!(config.default_fallback.label, "Inquiry");
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
confidence_threshold: 0.75
urgency:
  high: 99
"#;
        let config = PolicyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.urgency.high, 99);
        assert_eq!(config.urgency.low, 35);
        assert_eq!(config.medium_confidence, 0.85);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        assert!(PolicyConfig::from_yaml("confidence_threshold: 1.5").is_err());
        assert!(PolicyConfig::from_yaml("medium_confidence: -0.1").is_err());
    }

    #[test]
    fn test_urgency_scale() {
        let scale = UrgencyScale::default();
        assert_eq!(scale.score(Priority::High), 95);
        assert_eq!(scale.score(Priority::Medium), 70);
        assert_eq!(scale.score(Priority::Low), 35);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"high_risk_departments: [Medical]\n").unwrap();

        let config = PolicyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.high_risk_departments, vec!["Medical"]);
    }
}
