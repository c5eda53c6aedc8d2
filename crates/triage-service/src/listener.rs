//! Complaint queue listener
//!
//! Consumes complaint IDs from a message source, fetches the complaint text
//! from the backend, runs the triage pipeline and writes the result back. A
//! failure on one message is logged and the loop moves on to the next.

use crate::backend::{ClassificationUpdate, ComplaintStore, HttpComplaintStore};
use crate::pipeline::{self, Source};
use crate::state::AppState;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use triage_classifiers::Classifier;
use triage_core::{Error, Result};
use triage_policy::PolicyEngine;

/// Pause after the source reports an error, so a broken consumer does not spin
pub const SOURCE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Stream of raw message payloads
#[async_trait]
pub trait MessageSource: Send {
    /// Next payload, or `None` once the source is closed
    async fn next_payload(&mut self) -> Option<Result<Vec<u8>>>;
}

/// In-memory source fed through a channel
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_payload(&mut self) -> Option<Result<Vec<u8>>> {
        self.rx.recv().await.map(Ok)
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaSource;

#[cfg(feature = "kafka")]
mod kafka {
    use super::MessageSource;
    use crate::config::ListenerConfig;
    use async_trait::async_trait;
    use rdkafka::{
        consumer::{Consumer, StreamConsumer},
        ClientConfig, Message,
    };
    use triage_core::{Error, Result};

    /// Kafka consumer subscribed to the complaint topic
    pub struct KafkaSource {
        consumer: StreamConsumer,
    }

    impl KafkaSource {
        pub fn connect(broker: &str, config: &ListenerConfig) -> Result<Self> {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("group.id", &config.group_id)
                .set("bootstrap.servers", broker)
                .set("auto.offset.reset", &config.offset_reset)
                .set("enable.auto.commit", "true")
                .create()
                .map_err(|e| Error::config(format!("Failed to create Kafka consumer: {}", e)))?;

            consumer
                .subscribe(&[config.topic.as_str()])
                .map_err(|e| Error::config(format!("Failed to subscribe to '{}': {}", config.topic, e)))?;

            Ok(Self { consumer })
        }
    }

    #[async_trait]
    impl MessageSource for KafkaSource {
        async fn next_payload(&mut self) -> Option<Result<Vec<u8>>> {
            let next = match self.consumer.recv().await {
                Ok(message) => Ok(message.payload().map(<[u8]>::to_vec).unwrap_or_default()),
                Err(e) => Err(Error::internal(format!("Kafka receive failed: {}", e))),
            };
            Some(next)
        }
    }
}

/// Extract a complaint ID from a message payload.
///
/// Accepts a textual ID (optionally JSON-quoted) or an 8-byte big-endian
/// integer as written by a `Long` value serializer.
pub fn parse_complaint_id(payload: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(payload)
        .ok()
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if let Some(id) = text {
        return Some(id.to_string());
    }

    let bytes: [u8; 8] = payload.try_into().ok()?;
    Some(i64::from_be_bytes(bytes).to_string())
}

/// What happened to one message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Complaint classified and updated
    Classified { id: String, label: String },
    /// Nothing to do for this message
    Skipped { reason: String },
}

impl MessageOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Classified { .. } => "classified",
            Self::Skipped { .. } => "skipped",
        }
    }
}

pub struct Listener {
    classifier: Arc<dyn Classifier>,
    policy: Arc<PolicyEngine>,
    store: Arc<dyn ComplaintStore>,
    classified_status: String,
}

impl Listener {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        policy: Arc<PolicyEngine>,
        store: Arc<dyn ComplaintStore>,
        classified_status: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            policy,
            store,
            classified_status: classified_status.into(),
        }
    }

    /// Build the listener from service state.
    ///
    /// Returns `None` when no broker is configured. A broker without a
    /// backend URL is a configuration error.
    pub fn from_state(state: &AppState) -> Result<Option<Self>> {
        let config = &state.config.listener;
        if config.broker.is_none() {
            return Ok(None);
        }

        let backend_url = config
            .backend_url
            .as_deref()
            .ok_or_else(|| Error::config("BACKEND_URL must be set when KAFKA_BROKER is configured"))?;

        let store = HttpComplaintStore::new(
            backend_url,
            Duration::from_secs(config.backend_timeout_secs),
        )?;

        Ok(Some(Self::new(
            state.classifier.clone(),
            state.policy.clone(),
            Arc::new(store),
            config.classified_status.clone(),
        )))
    }

    /// Consume messages until the source closes
    pub async fn run<S: MessageSource>(&self, mut source: S) {
        info!("Complaint listener started");

        while let Some(next) = source.next_payload().await {
            let payload = match next {
                Ok(payload) => payload,
                Err(e) => {
                    metrics::counter!("triage_listener_messages_total", "outcome" => "source_error")
                        .increment(1);
                    error!(error = %e, "Message source failed");
                    tokio::time::sleep(SOURCE_ERROR_BACKOFF).await;
                    continue;
                }
            };

            match self.process(&payload).await {
                Ok(outcome) => {
                    metrics::counter!("triage_listener_messages_total", "outcome" => outcome.label())
                        .increment(1);
                    match &outcome {
                        MessageOutcome::Classified { id, label } => {
                            info!(complaint_id = %id, %label, "Complaint classified");
                        }
                        MessageOutcome::Skipped { reason } => {
                            warn!(%reason, "Complaint message skipped");
                        }
                    }
                }
                Err(e) => {
                    metrics::counter!("triage_listener_messages_total", "outcome" => "failed")
                        .increment(1);
                    error!(error = %e, "Complaint message failed");
                }
            }
        }

        info!("Complaint listener stopped");
    }

    /// Handle one message payload
    pub async fn process(&self, payload: &[u8]) -> Result<MessageOutcome> {
        let Some(id) = parse_complaint_id(payload) else {
            return Ok(MessageOutcome::Skipped {
                reason: format!("unreadable complaint id ({} bytes)", payload.len()),
            });
        };

        let Some(text) = self.store.fetch_text(&id).await? else {
            return Ok(MessageOutcome::Skipped {
                reason: format!("complaint {} has no text", id),
            });
        };

        let decision =
            pipeline::triage(self.classifier.as_ref(), &self.policy, &text, Source::Listener).await?;

        let metadata = json!({
            "department": decision.label,
            "category": decision.label,
            "priority": decision.priority,
            "confidence": decision.confidence,
            "urgencyScore": decision.urgency_score,
            "fallbackRule": decision.fallback_rule,
            "classifier": self.classifier.name(),
            "classifiedAt": chrono::Utc::now().to_rfc3339(),
        });

        self.store.update_status(&id, &self.classified_status).await?;
        self.store
            .attach_classification(
                &id,
                &ClassificationUpdate {
                    ai_metadata: metadata.to_string(),
                    urgency_score: decision.urgency_score,
                },
            )
            .await?;

        debug!(complaint_id = %id, metadata = %metadata, "Classification written back");

        Ok(MessageOutcome::Classified {
            id,
            label: decision.label,
        })
    }
}
