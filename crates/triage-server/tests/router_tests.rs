//! End-to-end tests for the HTTP surface, driven through the router

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;
use triage_classifiers::{build_selector, ClassificationMode, ClassifierConfig};
use triage_core::{ClassificationHistory, Error, PriorityBand, Result};
use triage_server::security::sign;
use triage_server::{create_router, AppState, LabelApplier, ServiceConfig};
use triage_telemetry::ClassificationStore;

const SECRET: &str = "whsec_router_test";

/// Records label calls, optionally failing them
#[derive(Default)]
struct RecordingLabeler {
    calls: Mutex<Vec<(String, PriorityBand)>>,
    fail: bool,
}

impl RecordingLabeler {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(String, PriorityBand)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelApplier for RecordingLabeler {
    async fn apply_label(&self, ticket_id: &str, band: PriorityBand) -> Result<()> {
        self.calls.lock().unwrap().push((ticket_id.to_string(), band));
        if self.fail {
            Err(Error::transport("support platform unreachable"))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    router: Router,
    store: Arc<ClassificationStore>,
    labeler: Arc<RecordingLabeler>,
    _dir: TempDir,
}

fn harness_with(secret: Option<&str>, labeler: RecordingLabeler, max_body_bytes: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ClassificationStore::open(dir.path().join("audit.jsonl")).unwrap());
    let labeler = Arc::new(labeler);

    let mut config = ServiceConfig::default();
    config.webhook.secret = secret.map(str::to_string);
    config.server.max_body_bytes = max_body_bytes;
    config.classifier = ClassifierConfig {
        mode: ClassificationMode::RulesOnly,
        ..Default::default()
    };

    let selector = build_selector(&config.classifier, store.clone()).unwrap();
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let state = AppState::from_parts(
        config,
        Arc::new(selector),
        store.clone(),
        labeler.clone(),
        handle,
    );

    Harness {
        router: create_router(state),
        store,
        labeler,
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with(Some(SECRET), RecordingLabeler::default(), 1024 * 1024)
}

fn thread_event(kind: &str, thread_id: &str, title: &str, preview: &str, tier: &str) -> String {
    serde_json::json!({
        "id": format!("evt_{}", thread_id),
        "type": kind,
        "payload": {
            "thread": {"id": thread_id, "title": title, "previewText": preview},
            "customer": {"tier": tier}
        }
    })
    .to_string()
}

fn signed_webhook(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-webhook-signature", sign(SECRET.as_bytes(), body.as_bytes()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_returns_ok() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn signed_urgent_ticket_is_labeled_and_stored() {
    let h = harness();
    let body = thread_event(
        "thread.created",
        "th_1",
        "Production outage",
        "Everything is down for our team",
        "enterprise",
    );

    let (status, value) = send(&h.router, signed_webhook(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "processed");
    assert_eq!(value["outcome"]["ticket_id"], "th_1");
    assert_eq!(value["outcome"]["event_id"], "evt_th_1");
    assert_eq!(value["outcome"]["classification"]["band"], "P0");
    assert_eq!(value["outcome"]["label"]["status"], "applied");
    assert_eq!(value["outcome"]["stored"], true);

    assert_eq!(h.labeler.calls(), vec![("th_1".to_string(), PriorityBand::P0)]);
    let record = h.store.get("th_1").unwrap();
    assert_eq!(record.band, PriorityBand::P0);
    assert_eq!(record.method, "rules");
}

#[tokio::test]
async fn low_confidence_ticket_is_left_for_manual_triage() {
    let h = harness();
    let body = thread_event("thread.created", "th_2", "", "hello there", "");

    let (status, value) = send(&h.router, signed_webhook(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"]["classification"]["band"], "P2");
    assert_eq!(value["outcome"]["label"]["status"], "manual_triage");
    assert_eq!(value["outcome"]["label"]["threshold"], 0.7);
    assert!(h.labeler.calls().is_empty());
    // Still persisted for the audit trail
    assert!(h.store.get("th_2").is_some());
}

#[tokio::test]
async fn label_failure_does_not_fail_the_webhook() {
    let h = harness_with(Some(SECRET), RecordingLabeler::failing(), 1024 * 1024);
    let body = thread_event(
        "thread.created",
        "th_3",
        "Urgent: outage",
        "production is down",
        "pro",
    );

    let (status, value) = send(&h.router, signed_webhook(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"]["label"]["status"], "failed");
    assert!(value["outcome"]["label"]["error"]
        .as_str()
        .unwrap()
        .contains("unreachable"));
    assert_eq!(value["outcome"]["stored"], true);
    assert_eq!(h.labeler.calls().len(), 1);
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let h = harness();
    let body = thread_event("thread.created", "th_4", "Outage", "down", "pro");
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-webhook-signature", sign(b"wrong secret", body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let (status, value) = send(&h.router, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["error"]["type"], "authentication_error");
    assert!(h.labeler.calls().is_empty());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let h = harness();
    let body = thread_event("thread.created", "th_5", "Outage", "down", "pro");

    let (status, _) = send(&h.router, post_json("/webhook", &body)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unsigned_webhook_accepted_without_secret() {
    let h = harness_with(None, RecordingLabeler::default(), 1024 * 1024);
    let body = thread_event("thread.created", "th_6", "Question", "how do i export data", "");

    let (status, value) = send(&h.router, post_json("/webhook", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "processed");
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let h = harness();
    let (status, value) = send(&h.router, signed_webhook("{\"type\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"]["type"], "invalid_request_error");

    // Valid JSON without a payload
    let (status, _) = send(&h.router, signed_webhook(r#"{"type":"thread.created"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_ticket_defaults_to_p2() {
    let h = harness();
    let body = thread_event("thread.created", "th_7", "  ", "", "");

    let (status, value) = send(&h.router, signed_webhook(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "processed");
    assert_eq!(value["outcome"]["classification"]["band"], "P2");
    assert_eq!(value["outcome"]["classification"]["confidence"], 0.0);
    assert_eq!(value["outcome"]["label"]["status"], "manual_triage");
    assert!(h.labeler.calls().is_empty());
    assert_eq!(h.store.get("th_7").unwrap().band, PriorityBand::P2);
}

#[tokio::test]
async fn unhandled_event_is_ignored() {
    let h = harness();
    let body = thread_event("thread.assigned", "th_8", "Outage", "down", "pro");

    let (status, value) = send(&h.router, signed_webhook(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "ignored");
    assert_eq!(value["event_type"], "thread.assigned");
    assert!(h.labeler.calls().is_empty());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let h = harness_with(Some(SECRET), RecordingLabeler::default(), 64);
    let body = thread_event("thread.created", "th_9", "Outage", &"x".repeat(500), "pro");

    let response = h.router.clone().oneshot(signed_webhook(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn classify_is_a_dry_run() {
    let h = harness();
    let (status, value) = send(
        &h.router,
        post_json(
            "/classify",
            r#"{"id":"adhoc_1","title":"Billing error","body":"I was charged twice","customer_tier":"business"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["band"], "P1");
    assert_eq!(value["method"], "rules");
    assert_eq!(value["strategy"], "rules");
    assert!(h.labeler.calls().is_empty());
    assert!(h.store.get("adhoc_1").is_none());

    let (status, value) = send(&h.router, post_json("/classify", r#"{"title":""}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["band"], "P2");
}

#[tokio::test]
async fn compare_reports_unavailable_model() {
    let h = harness();
    let (status, value) = send(
        &h.router,
        post_json("/compare", r#"{"body":"the app crashes with an error"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["rules"]["status"], "classified");
    assert_eq!(value["model"]["status"], "unavailable");
    assert!(value["reconciled"].is_null());
}

#[tokio::test]
async fn stats_reflect_processed_events() {
    let h = harness();
    let urgent = thread_event("thread.created", "th_10", "Outage", "production down", "enterprise");
    let vague = thread_event("thread.created", "th_11", "", "hello", "");
    let ignored = thread_event("thread.closed", "th_12", "", "bye", "");
    for body in [&urgent, &vague, &ignored] {
        let (status, _) = send(&h.router, signed_webhook(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, value) = send(
        &h.router,
        Request::get("/stats").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["mode"], "rules-only");
    assert_eq!(value["model_available"], false);
    assert_eq!(value["counters"]["events_received"], 3);
    assert_eq!(value["counters"]["events_ignored"], 1);
    assert_eq!(value["counters"]["classifications"], 2);
    assert_eq!(value["counters"]["labels_applied"], 1);
    assert_eq!(value["counters"]["manual_triage"], 1);
    assert_eq!(value["priorities"]["total"], 2);
    assert_eq!(value["priorities"]["by_band"]["P0"], 1);
    assert_eq!(value["priorities"]["by_band"]["P2"], 1);

    let stats = h.store.priority_stats(7).await.unwrap();
    assert_eq!(stats.total, 2);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let h = harness();
    let (status, value) = send(
        &h.router,
        Request::get("/nope").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"]["message"], "Not found");
}
