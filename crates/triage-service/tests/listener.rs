//! Queue listener against an in-process stand-in for the complaint backend

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use triage_classifiers::{ClassificationResult, Classifier};
use triage_core::{Error, Result};
use triage_policy::{PolicyConfig, PolicyEngine};
use triage_service::backend::HttpComplaintStore;
use triage_service::listener::{
    ChannelSource, Listener, MessageOutcome, MessageSource, SOURCE_ERROR_BACKOFF,
};
use triage_service::{AppState, ServiceConfig};

struct FixedClassifier {
    label: &'static str,
    score: f32,
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult> {
        Ok(ClassificationResult::new(self.label, self.score))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Calls seen by the stand-in backend: (method, path, body)
type Calls = Arc<Mutex<Vec<(String, String, Value)>>>;

async fn get_complaint(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match id.as_str() {
        "404" => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))),
        "blank" => (StatusCode::OK, Json(json!({"id": id, "complaintText": "   "}))),
        _ => (
            StatusCode::OK,
            Json(json!({
                "id": id,
                "complaintText": "Medical emergency in coach S5, passenger collapsed"
            })),
        ),
    }
}

async fn patch_status(
    State(calls): State<Calls>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    if id == "500" {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    calls
        .lock()
        .unwrap()
        .push(("PATCH".into(), format!("/complaints/{}/status", id), body));
    StatusCode::OK
}

async fn patch_complaint(
    State(calls): State<Calls>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    calls
        .lock()
        .unwrap()
        .push(("PATCH".into(), format!("/complaints/{}", id), body));
    StatusCode::OK
}

async fn spawn_backend() -> (String, Calls) {
    let calls: Calls = Arc::default();
    let app = Router::new()
        .route("/complaints/:id", get(get_complaint).patch(patch_complaint))
        .route("/complaints/:id/status", patch(patch_status))
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/complaints/", addr), calls)
}

fn listener_for(base_url: &str, label: &'static str, score: f32) -> Listener {
    let policy = PolicyEngine::new(&PolicyConfig::default()).unwrap();
    let store = HttpComplaintStore::new(base_url, Duration::from_secs(5)).unwrap();
    Listener::new(
        Arc::new(FixedClassifier { label, score }),
        Arc::new(policy),
        Arc::new(store),
        "IN_PROGRESS",
    )
}

#[tokio::test]
async fn test_classified_complaint_is_patched_twice() {
    let (base, calls) = spawn_backend().await;
    let listener = listener_for(&base, "Medical", 0.45);

    let outcome = listener.process(&7i64.to_be_bytes()).await.unwrap();
    assert_eq!(
        outcome,
        MessageOutcome::Classified {
            id: "7".into(),
            label: "Emergency".into()
        }
    );

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);

    assert_eq!(calls[0].1, "/complaints/7/status");
    assert_eq!(calls[0].2, json!({"newStatus": "IN_PROGRESS"}));

    assert_eq!(calls[1].1, "/complaints/7");
    assert_eq!(calls[1].2["urgencyScore"], 90);
    let metadata: Value = serde_json::from_str(calls[1].2["aiMetadata"].as_str().unwrap()).unwrap();
    assert_eq!(metadata["department"], "Emergency");
    assert_eq!(metadata["priority"], "high");
    assert_eq!(metadata["urgencyScore"], 90);
    assert_eq!(metadata["fallbackRule"], "emergency");
    assert_eq!(metadata["classifier"], "fixed");
    assert!(metadata["classifiedAt"].is_string());
}

#[tokio::test]
async fn test_missing_complaint_is_skipped() {
    let (base, calls) = spawn_backend().await;
    let listener = listener_for(&base, "Water", 0.9);

    let missing = listener.process(b"404").await.unwrap();
    assert!(matches!(missing, MessageOutcome::Skipped { .. }));

    let blank = listener.process(b"blank").await.unwrap();
    assert!(matches!(blank, MessageOutcome::Skipped { .. }));

    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_status_patch_stops_before_metadata() {
    let (base, calls) = spawn_backend().await;
    let listener = listener_for(&base, "Water", 0.9);

    let result = listener.process(b"500").await;
    assert!(matches!(result, Err(Error::Backend(_))));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_continues_after_failures() {
    let (base, calls) = spawn_backend().await;
    let listener = listener_for(&base, "Water", 0.9);

    let (tx, rx) = mpsc::channel(8);
    tx.send(b"404".to_vec()).await.unwrap();
    tx.send(b"500".to_vec()).await.unwrap();
    tx.send(b"\xff\xfe".to_vec()).await.unwrap();
    tx.send(b"\"12\"".to_vec()).await.unwrap();
    drop(tx);

    listener.run(ChannelSource::new(rx)).await;

    let calls = calls.lock().unwrap().clone();
    let paths: Vec<_> = calls.iter().map(|(_, path, _)| path.as_str()).collect();
    assert_eq!(paths, vec!["/complaints/12/status", "/complaints/12"]);

    let metadata: Value = serde_json::from_str(calls[1].2["aiMetadata"].as_str().unwrap()).unwrap();
    assert_eq!(metadata["department"], "Water");
    assert_eq!(metadata["priority"], "medium");
    assert_eq!(calls[1].2["urgencyScore"], 70);
}

/// Fails a fixed number of times, then closes
struct BrokenSource {
    failures: usize,
}

#[async_trait]
impl MessageSource for BrokenSource {
    async fn next_payload(&mut self) -> Option<Result<Vec<u8>>> {
        if self.failures == 0 {
            return None;
        }
        self.failures -= 1;
        Some(Err(Error::internal("broker transport failure")))
    }
}

#[tokio::test(start_paused = true)]
async fn test_source_errors_pause_before_next_receive() {
    let listener = listener_for("http://127.0.0.1:9/complaints/", "Water", 0.9);

    let start = tokio::time::Instant::now();
    listener.run(BrokenSource { failures: 3 }).await;

    assert!(start.elapsed() >= SOURCE_ERROR_BACKOFF * 3);
}

#[test]
fn test_listener_requires_backend_url_with_broker() {
    let classifier: Arc<dyn Classifier> = Arc::new(FixedClassifier {
        label: "Water",
        score: 0.9,
    });

    let disabled = AppState::new(ServiceConfig::default(), classifier.clone(), None).unwrap();
    assert!(Listener::from_state(&disabled).unwrap().is_none());

    let mut config = ServiceConfig::default();
    config.listener.broker = Some("localhost:9092".into());
    let missing_url = AppState::new(config.clone(), classifier.clone(), None).unwrap();
    assert!(matches!(Listener::from_state(&missing_url), Err(Error::Config(_))));

    config.listener.backend_url = Some("http://backend/complaints/".into());
    let enabled = AppState::new(config, classifier, None).unwrap();
    assert!(Listener::from_state(&enabled).unwrap().is_some());
}
