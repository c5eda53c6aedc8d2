//! Complaint triage service
//!
//! Classifies free-text complaints into departments with a hosted or
//! in-process model, applies the keyword fallback and priority policy, and
//! optionally consumes complaint IDs from Kafka.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

use triage_service::cli::Cli;
use triage_service::listener::Listener;
use triage_service::{routes, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    info!("Starting complaint triage service");

    let config = ServiceConfig::load(&cli)?;
    info!("Configuration loaded from {}", cli.config);
    info!("Inference backend: {:?}", config.inference.backend);
    info!("Response shape: {}", config.output);
    info!(
        "Confidence threshold: {}, fallback rules: {}",
        config.policy.confidence_threshold,
        config.policy.fallback_rules.len()
    );

    let metrics_handle = init_metrics()?;

    info!("Loading classifier...");
    let classifier =
        triage_classifiers::build_classifier(&config.inference, cli.hf_token.as_deref()).await?;
    info!("Classifier ready: {}", classifier.name());

    let addr: SocketAddr = format!("{}:{}", config.server.listen, config.server.port).parse()?;
    let state = AppState::new(config, classifier, Some(metrics_handle))?;

    let listener_task = spawn_listener(&state)?;

    let app = routes::create_router(state);
    let tcp = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(tcp, app).with_graceful_shutdown(shutdown).await?;

    if let Some(task) = listener_task {
        task.abort();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Start the complaint listener when a broker is configured
fn spawn_listener(state: &AppState) -> Result<Option<tokio::task::JoinHandle<()>>> {
    let Some(listener) = Listener::from_state(state)? else {
        info!("No Kafka broker configured, complaint listener disabled");
        return Ok(None);
    };

    let broker = state.config.listener.broker.clone().unwrap_or_default();

    #[cfg(feature = "kafka")]
    {
        let config = &state.config.listener;
        let source = triage_service::listener::KafkaSource::connect(&broker, config)?;
        info!(%broker, topic = %config.topic, "Complaint listener subscribed");
        Ok(Some(tokio::spawn(async move { listener.run(source).await })))
    }

    #[cfg(not(feature = "kafka"))]
    {
        drop(listener);
        warn!(%broker, "Kafka broker configured but this build lacks the 'kafka' feature");
        Ok(None)
    }
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("triage=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("triage=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "triage_requests_total",
        "Total number of complaints classified by source"
    );
    metrics::describe_counter!(
        "triage_fallback_total",
        "Low-confidence predictions overridden by a keyword rule"
    );
    metrics::describe_histogram!(
        "triage_inference_latency_us",
        metrics::Unit::Microseconds,
        "Inference latency in microseconds by classifier"
    );
    metrics::describe_counter!("triage_errors_total", "Total number of inference errors by kind");
    metrics::describe_counter!(
        "triage_listener_messages_total",
        "Queue messages handled by outcome"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
