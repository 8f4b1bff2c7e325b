//! Integration tests for the delivery retry contract.
//!
//! Each test spins up an Axum server on a random port that scripts its
//! responses per attempt, and exercises the real HTTP contract: headers,
//! backoff ordering, permanent-vs-transient classification.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use secrecy::SecretString;

use mailhook::classify::SpamStatus;
use mailhook::delivery::DeliveryClient;
use mailhook::error::DeliveryError;
use mailhook::payload::DeliveryPayload;

/// Scripted downstream endpoint.
struct Downstream {
    hits: AtomicU32,
    /// Status to return per attempt; attempts past the end get 200.
    responses: Vec<u16>,
    request_times: Mutex<Vec<Instant>>,
    last_headers: Mutex<Option<HeaderMap>>,
    last_body: Mutex<Option<String>>,
}

async fn hook(
    State(state): State<Arc<Downstream>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let index = state.hits.fetch_add(1, Ordering::SeqCst) as usize;
    state.request_times.lock().unwrap().push(Instant::now());
    *state.last_headers.lock().unwrap() = Some(headers);
    *state.last_body.lock().unwrap() = Some(body);

    let code = state.responses.get(index).copied().unwrap_or(200);
    StatusCode::from_u16(code).unwrap()
}

/// Start a downstream stub on a random port; returns its URL and state.
async fn start_downstream(responses: Vec<u16>) -> (String, Arc<Downstream>) {
    let state = Arc::new(Downstream {
        hits: AtomicU32::new(0),
        responses,
        request_times: Mutex::new(Vec::new()),
        last_headers: Mutex::new(None),
        last_body: Mutex::new(None),
    });

    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}/hook"), state)
}

fn sample_payload() -> DeliveryPayload {
    DeliveryPayload {
        message_id: "msg-42".into(),
        from: "Alice <alice@example.com>".into(),
        to: vec!["bob@example.net".into()],
        subject: "Hello".into(),
        text: "hi there".into(),
        html: String::new(),
        headers: BTreeMap::new(),
        spam_status: SpamStatus::Unknown,
        spam_score: 0.0,
        spam_threshold: 5.0,
        spam_report: None,
        attachments: vec![],
        attachment_count: 0,
        has_attachments: false,
        size: 8,
        timestamp: "2026-08-07T12:00:00+00:00".into(),
        is_bounce: false,
    }
}

fn client(endpoint: &str, max_attempts: u32, base_delay_ms: u64) -> DeliveryClient {
    DeliveryClient::new(
        endpoint,
        SecretString::from("test-api-key"),
        max_attempts,
        Duration::from_millis(base_delay_ms),
    )
}

#[tokio::test]
async fn succeeds_on_third_attempt_with_nondecreasing_backoff() {
    let (url, state) = start_downstream(vec![503, 503, 200]).await;

    let delivered = client(&url, 5, 40).deliver(&sample_payload()).await.unwrap();
    assert_eq!(delivered.attempts, 3);
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);

    let times = state.request_times.lock().unwrap();
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    assert!(
        second_gap >= first_gap,
        "backoff should not decrease: {first_gap:?} then {second_gap:?}"
    );
    assert!(first_gap >= Duration::from_millis(40));
}

#[tokio::test]
async fn permanent_400_aborts_with_zero_retries() {
    let (url, state) = start_downstream(vec![400]).await;

    let err = client(&url, 5, 10).deliver(&sample_payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Permanent { status: 400, .. }));
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rate_limit_429_is_retried() {
    let (url, state) = start_downstream(vec![429, 200]).await;

    let delivered = client(&url, 3, 10).deliver(&sample_payload()).await.unwrap();
    assert_eq!(delivered.attempts, 2);
    assert_eq!(state.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_error() {
    let (url, state) = start_downstream(vec![503, 502, 500]).await;

    let err = client(&url, 3, 10).deliver(&sample_payload()).await.unwrap_err();
    match err {
        DeliveryError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, DeliveryError::Upstream { status: 500 }));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn every_call_carries_auth_and_idempotency_headers() {
    let (url, state) = start_downstream(vec![200]).await;

    client(&url, 1, 10).deliver(&sample_payload()).await.unwrap();

    let headers = state.last_headers.lock().unwrap().clone().unwrap();
    assert_eq!(
        headers.get("authorization").unwrap(),
        "Bearer test-api-key"
    );
    assert_eq!(headers.get("x-message-id").unwrap(), "msg-42");
    assert_eq!(headers.get("idempotency-key").unwrap(), "msg-42");

    let body: serde_json::Value =
        serde_json::from_str(state.last_body.lock().unwrap().as_deref().unwrap()).unwrap();
    assert_eq!(body["message_id"], "msg-42");
    assert_eq!(body["subject"], "Hello");
}
