//! Complaint triage policy
//!
//! Deterministic decision table applied after inference:
//! - Keyword fallback when model confidence is below the trust threshold
//! - Department and confidence to priority mapping
//! - Priority to urgency score mapping for downstream routing
//!
//! Policies are plain data and load from YAML; the defaults reproduce the
//! production constants.

pub mod config;
pub mod engine;
pub mod priority;
pub mod rule;

pub use config::{PolicyConfig, UrgencyScale};
pub use engine::{Decision, PolicyEngine};
pub use priority::PriorityPolicy;
pub use rule::{FallbackRule, KeywordRule};
