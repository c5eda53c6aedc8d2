//! Command-line interface
//!
//! Flags override the config file. Credentials and listener wiring can also
//! come from the environment (`HF_TOKEN`, `KAFKA_BROKER`, `KAFKA_TOPIC`,
//! `BACKEND_URL`).

use crate::config::OutputShape;
use clap::Parser;
use triage_classifiers::InferenceBackend;

#[derive(Parser, Debug, Default)]
#[command(name = "triage-service")]
#[command(author, version, about = "Complaint classification and triage service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "triage.yaml")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Inference backend: remote or local
    #[arg(short, long, value_parser = parse_backend)]
    pub inference: Option<InferenceBackend>,

    /// Response shape: category, department or raw
    #[arg(short, long, value_parser = parse_output)]
    pub output: Option<OutputShape>,

    /// Bearer token for hosted inference and private model downloads
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Kafka bootstrap servers; enables the complaint listener
    #[arg(long, env = "KAFKA_BROKER")]
    pub kafka_broker: Option<String>,

    /// Kafka topic carrying complaint IDs
    #[arg(long, env = "KAFKA_TOPIC")]
    pub kafka_topic: Option<String>,

    /// Complaint backend base URL, e.g. https://backend.example.com/complaints/
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

fn parse_backend(s: &str) -> Result<InferenceBackend, String> {
    match s.to_ascii_lowercase().as_str() {
        "remote" => Ok(InferenceBackend::Remote),
        "local" => Ok(InferenceBackend::Local),
        other => Err(format!("unknown inference backend '{}' (expected remote or local)", other)),
    }
}

fn parse_output(s: &str) -> Result<OutputShape, String> {
    s.parse()
}
