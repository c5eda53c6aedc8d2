//! Keyword fallback rules

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use triage_core::{Error, Result};

/// A fallback rule as written in policy files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRule {
    /// Rule identifier, reported with the decision
    pub name: String,

    /// Label assigned when the rule fires
    pub label: String,

    /// Any of these (lower-case) substrings fires the rule.
    /// Empty for the default rule, which always fires.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Urgency score assigned when the rule fires
    pub score: u8,
}

impl FallbackRule {
    /// Create a rule
    pub fn new<I, S>(name: &str, label: &str, keywords: I, score: u8) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            score,
        }
    }
}

/// A fallback rule with its keyword automaton built
#[derive(Debug, Clone)]
pub struct KeywordRule {
    rule: FallbackRule,
    matcher: AhoCorasick,
}

impl KeywordRule {
    /// Compile a rule. Rules without keywords are rejected; use the default rule for those.
    pub fn compile(rule: FallbackRule) -> Result<Self> {
        if rule.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(Error::policy(format!(
                "fallback rule '{}' has no keywords",
                rule.name
            )));
        }

        let keywords: Vec<String> = rule
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let matcher = AhoCorasick::new(&keywords).map_err(|e| {
            Error::policy(format!(
                "Failed to build matcher for rule '{}': {}",
                rule.name, e
            ))
        })?;

        Ok(Self { rule, matcher })
    }

    /// Whether any keyword occurs in already lower-cased text
    pub fn matches(&self, lowered: &str) -> bool {
        self.matcher.is_match(lowered)
    }

    /// The underlying rule
    pub fn rule(&self) -> &FallbackRule {
        &self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_keyword() {
        let rule =
            KeywordRule::compile(FallbackRule::new("upkeep", "Maintenance", ["clean", "maintenance"], 50))
                .unwrap();
        assert!(rule.matches("the toilet needs cleaning"));
        assert!(rule.matches("maintenance overdue"));
        assert!(!rule.matches("fan broken"));
    }

    #[test]
    fn test_keywords_are_lowercased() {
        let rule = KeywordRule::compile(FallbackRule::new("sec", "Security", ["SECURITY"], 80)).unwrap();
        assert!(rule.matches("no security staff on platform"));
    }

    #[test]
    fn test_rule_without_keywords_rejected() {
        let result = KeywordRule::compile(FallbackRule::new("empty", "Inquiry", Vec::<String>::new(), 30));
        assert!(result.is_err());

        let blank = KeywordRule::compile(FallbackRule::new("blank", "Inquiry", ["  "], 30));
        assert!(blank.is_err());
    }

    #[test]
    fn test_rule_deserialization() {
        let yaml = r#"
name: emergency
label: Emergency
keywords: [urgent, emergency]
score: 90
"#;
        let rule: FallbackRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.keywords, vec!["urgent", "emergency"]);
        assert_eq!(rule.score, 90);
    }
}
