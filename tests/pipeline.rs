//! End-to-end pipeline tests: raw queue entry in, webhook POST out.
//!
//! A capture server on a random port stands in for the downstream
//! application; the processor runs the real decode → classify → assemble →
//! deliver path against it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::SecretString;

use mailhook::config::Config;
use mailhook::decode::MimeDecoder;
use mailhook::delivery::DeliveryClient;
use mailhook::worker::{EntryProcessor, ProcessOutcome};

struct Capture {
    hits: AtomicU32,
    bodies: Mutex<Vec<serde_json::Value>>,
}

async fn hook(State(state): State<Arc<Capture>>, body: String) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .bodies
        .lock()
        .unwrap()
        .push(serde_json::from_str(&body).unwrap());
    StatusCode::OK
}

async fn start_capture() -> (String, Arc<Capture>) {
    let state = Arc::new(Capture {
        hits: AtomicU32::new(0),
        bodies: Mutex::new(Vec::new()),
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

fn config(endpoint: &str) -> Config {
    Config {
        queue_url: "redis://127.0.0.1:6379".into(),
        queue_name: "mail:inbound".into(),
        dlq_name: "mail:inbound:dead".into(),
        endpoint: endpoint.to_string(),
        api_key: SecretString::from("test-api-key"),
        max_attempts: 2,
        base_delay: Duration::from_millis(10),
        include_content: true,
        forward_bounces: false,
        max_message_size: 1024 * 1024,
        dequeue_timeout: Duration::from_secs(1),
        report_interval: Duration::from_secs(60),
    }
}

fn processor(config: &Config) -> EntryProcessor {
    EntryProcessor::new(
        MimeDecoder::with_default_strategies(),
        DeliveryClient::new(
            &config.endpoint,
            config.api_key.clone(),
            config.max_attempts,
            config.base_delay,
        ),
        config,
    )
}

fn entry_json(raw: &[u8], notes: Option<serde_json::Value>) -> String {
    let entry = serde_json::json!({
        "version": 1,
        "id": "msg-e2e-1",
        "enqueued_at": "2026-08-07T09:30:00Z",
        "sender": "alice@example.com",
        "recipients": ["bob@example.net"],
        "size": raw.len(),
        "peer": {"ip": "203.0.113.7", "hostname": "mx.example.com"},
        "encrypted": true,
        "notes": notes,
        "raw": BASE64.encode(raw),
    });
    entry.to_string()
}

const MESSAGE: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: Bob <bob@example.net>\r\n\
Subject: Quarterly numbers\r\n\
X-Spam-Status: No, score=0.3 required=5.0\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Numbers attached.\r\n\
--sep\r\n\
Content-Type: text/csv; name=\"q3.csv\"\r\n\
Content-Disposition: attachment; filename=\"q3.csv\"\r\n\
\r\n\
a,b\r\n\
1,2\r\n\
--sep--\r\n";

#[tokio::test]
async fn entry_processes_to_exactly_one_delivery() {
    let (url, capture) = start_capture().await;
    let cfg = config(&url);

    let outcome = processor(&cfg).process(&entry_json(MESSAGE, None)).await;
    match outcome {
        ProcessOutcome::Delivered { id, attempts } => {
            assert_eq!(id, "msg-e2e-1");
            assert_eq!(attempts, 1);
        }
        other => panic!("expected delivery, got {other:?}"),
    }

    assert_eq!(capture.hits.load(Ordering::SeqCst), 1);
    let bodies = capture.bodies.lock().unwrap();
    let body = &bodies[0];

    assert_eq!(body["message_id"], "msg-e2e-1");
    assert_eq!(body["subject"], "Quarterly numbers");
    assert!(body["from"].as_str().unwrap().contains("alice@example.com"));
    assert!(body["text"].as_str().unwrap().contains("Numbers attached."));
    assert_eq!(body["is_bounce"], false);
    assert_eq!(body["timestamp"], "2026-08-07T09:30:00+00:00");

    // Spam inferred from the header, since the entry carried no verdict.
    assert_eq!(body["spam_status"], "no");
    assert_eq!(body["spam_score"], 0.3);

    // Attachment with content, since include_content is on.
    assert_eq!(body["attachment_count"], 1);
    assert_eq!(body["has_attachments"], true);
    assert_eq!(body["attachments"][0]["filename"], "q3.csv");
    assert!(body["attachments"][0]["content"].is_string());

    // Header map preserved key case.
    assert!(body["headers"].get("X-Spam-Status").is_some());
}

#[tokio::test]
async fn transaction_verdict_outranks_header_inference() {
    let (url, capture) = start_capture().await;
    let cfg = config(&url);

    let notes = serde_json::json!({
        "spam": {"score": 9.9, "required": 5.0, "passed": false, "rules": ["BAYES_99"]}
    });
    let outcome = processor(&cfg)
        .process(&entry_json(MESSAGE, Some(notes)))
        .await;
    assert!(matches!(outcome, ProcessOutcome::Delivered { .. }));

    let bodies = capture.bodies.lock().unwrap();
    assert_eq!(bodies[0]["spam_status"], "yes");
    assert_eq!(bodies[0]["spam_score"], 9.9);
    assert_eq!(bodies[0]["spam_report"], "BAYES_99");
}

#[tokio::test]
async fn forwarded_bounce_carries_the_flag() {
    let (url, capture) = start_capture().await;
    let cfg = Config {
        forward_bounces: true,
        ..config(&url)
    };

    let bounce: &[u8] = b"From: MAILER-DAEMON@mx.example.com\r\n\
Subject: Undelivered Mail Returned to Sender\r\n\
\r\n\
Final-Recipient: rfc822; gone@example.net\r\n\
Action: failed\r\n";

    let outcome = processor(&cfg).process(&entry_json(bounce, None)).await;
    assert!(matches!(outcome, ProcessOutcome::Delivered { .. }));

    let bodies = capture.bodies.lock().unwrap();
    assert_eq!(bodies[0]["is_bounce"], true);
}

#[tokio::test]
async fn skipped_bounce_never_reaches_the_downstream() {
    let (url, capture) = start_capture().await;
    let cfg = config(&url); // forward_bounces: false

    let bounce: &[u8] = b"From: MAILER-DAEMON@mx.example.com\r\n\
Subject: Undelivered Mail Returned to Sender\r\n\
\r\n\
Final-Recipient: rfc822; gone@example.net\r\n\
Action: failed\r\n";

    let outcome = processor(&cfg).process(&entry_json(bounce, None)).await;
    assert!(matches!(outcome, ProcessOutcome::SkippedBounce { .. }));
    assert_eq!(capture.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn garbled_subject_arrives_repaired() {
    let (url, capture) = start_capture().await;
    let cfg = config(&url);

    // UTF-8 bytes inside an encoded-word labeled ISO-8859-1: decodes to
    // mojibake, which the normalizer repairs before assembly.
    let garbled: &[u8] = b"From: a@b.c\r\n\
To: d@e.f\r\n\
Subject: =?iso-8859-1?Q?R=C3=A9union_demain?=\r\n\
\r\n\
A demain.\r\n";

    let outcome = processor(&cfg).process(&entry_json(garbled, None)).await;
    assert!(matches!(outcome, ProcessOutcome::Delivered { .. }));

    let bodies = capture.bodies.lock().unwrap();
    assert_eq!(bodies[0]["subject"], "Réunion demain");
}
