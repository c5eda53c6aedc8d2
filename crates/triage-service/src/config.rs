//! Service configuration
//!
//! Layered: built-in defaults, then the YAML file, then `TRIAGE__`-prefixed
//! environment variables (`TRIAGE__SERVER__PORT=9000`), then CLI flags and the
//! well-known variables (`KAFKA_BROKER`, `KAFKA_TOPIC`, `BACKEND_URL`).

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use triage_classifiers::InferenceConfig;
use triage_policy::PolicyConfig;

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Shape of `/classify` responses
    #[serde(default)]
    pub output: OutputShape,

    /// Inference backend settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Inline triage policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Separate policy file, replaces the inline policy when set
    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    /// Queue listener settings
    #[serde(default)]
    pub listener: ListenerConfig,
}

impl ServiceConfig {
    /// Load configuration from file, environment and CLI overrides
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&cli.config).required(false))
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        config.apply_cli(cli);

        if let Some(path) = &config.policy_file {
            config.policy = PolicyConfig::from_file(path)?;
        }
        config.policy.validate()?;

        Ok(config)
    }

    /// Apply CLI flags and well-known environment variables
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(backend) = cli.inference {
            self.inference.backend = backend;
        }
        if let Some(output) = cli.output {
            self.output = output;
        }
        if let Some(broker) = &cli.kafka_broker {
            self.listener.broker = Some(broker.clone());
        }
        if let Some(topic) = &cli.kafka_topic {
            self.listener.topic = topic.clone();
        }
        if let Some(url) = &cli.backend_url {
            self.listener.backend_url = Some(url.clone());
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Queue listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Kafka bootstrap servers; the listener runs only when set
    #[serde(default)]
    pub broker: Option<String>,

    /// Topic carrying complaint IDs
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Consumer group
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Where a new consumer group starts reading (earliest, latest)
    #[serde(default = "default_offset_reset")]
    pub offset_reset: String,

    /// Complaint backend base URL; complaint IDs are appended directly
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Status written back once a complaint is classified
    #[serde(default = "default_classified_status")]
    pub classified_status: String,

    /// Backend request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            broker: None,
            topic: default_topic(),
            group_id: default_group_id(),
            offset_reset: default_offset_reset(),
            backend_url: None,
            classified_status: default_classified_status(),
            backend_timeout_secs: default_backend_timeout(),
        }
    }
}

/// Shape of `/classify` responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// `{category, confidence}`
    #[default]
    Category,
    /// `{department, priority, confidence}`
    Department,
    /// `{prediction: <raw inference output>}`
    Raw,
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Category => "category",
            Self::Department => "department",
            Self::Raw => "raw",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "department" => Ok(Self::Department),
            "raw" => Ok(Self::Raw),
            other => Err(format!(
                "unknown output shape '{}' (expected category, department or raw)",
                other
            )),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_topic() -> String {
    "complaint-classification".to_string()
}

fn default_group_id() -> String {
    "complaint-triage".to_string()
}

fn default_offset_reset() -> String {
    "latest".to_string()
}

fn default_classified_status() -> String {
    "IN_PROGRESS".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}
