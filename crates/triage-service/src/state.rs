//! Shared application state

use crate::config::ServiceConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use triage_classifiers::Classifier;
use triage_policy::PolicyEngine;

/// Application state shared across all requests and the listener
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServiceConfig>,

    /// Inference backend, built once at startup and used read-only
    pub classifier: Arc<dyn Classifier>,

    /// Compiled triage policy
    pub policy: Arc<PolicyEngine>,

    /// Prometheus handle for rendering `/metrics`
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from configuration and an already constructed classifier
    pub fn new(
        config: ServiceConfig,
        classifier: Arc<dyn Classifier>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> triage_core::Result<Self> {
        let policy = PolicyEngine::new(&config.policy)?;

        Ok(Self {
            config: Arc::new(config),
            classifier,
            policy: Arc::new(policy),
            metrics_handle,
        })
    }
}
