//! HTTP backend tests against a local mock server
//!
//! Covers request shapes for both query endpoints, reply classification, the
//! two probes, and how each transport failure is reported.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use klai_core::{
    AssistantBackend, Attachment, BackendConfig, BackendError, BackendReply, ClientError,
    DirectiveKind, HttpBackend, QueryRequest,
};

fn backend_for(server: &MockServer) -> HttpBackend {
    let config = BackendConfig {
        user_id: "u-42".to_string(),
        session_id: "s-7".to_string(),
        probe_timeout: Duration::from_secs(2),
        query_timeout: Duration::from_secs(5),
        ..BackendConfig::new(server.uri())
    };
    HttpBackend::new(config).unwrap()
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_text_query_posts_json_to_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({
            "message": "Hello",
            "user_id": "u-42",
            "session_id": "s-7",
            "access_token": "tok",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Hi there!",
            "source": "ollama",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let request = QueryRequest::new("Hello").with_access_token(Some("tok".to_string()));
    let reply = assert_ok!(backend.send_query(&request).await);

    assert_eq!(
        reply,
        BackendReply::Text {
            text: "Hi there!".to_string(),
            source: Some("ollama".to_string()),
        }
    );
}

#[tokio::test]
async fn test_image_query_posts_multipart_to_unified_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/unified_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "A cat on a sofa.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let request = QueryRequest::new("Please analyze this image.").with_attachment(Some(
        Attachment::new("cat.png", "image/png", b"PNGDATA".to_vec()),
    ));
    let reply = assert_ok!(backend.send_query(&request).await);
    assert_eq!(reply, BackendReply::text("A cat on a sofa."));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let content_type = received[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains("name=\"message\""));
    assert!(body.contains("Please analyze this image."));
    assert!(body.contains("name=\"image\"; filename=\"cat.png\""));
    assert!(body.contains("image/png"));
    assert!(body.contains("PNGDATA"));
    assert!(body.contains("u-42"));
}

#[tokio::test]
async fn test_directive_reply_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "I'll let John know.",
            "instruction": "SEND_SMS",
            "recipient": "+15551234567",
            "message_content": "Running late",
            "contact_name": "John",
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let reply = assert_ok!(backend.send_query(&QueryRequest::new("Text John")).await);

    let BackendReply::Directive(directive) = reply else {
        panic!("expected a directive, got {reply:?}");
    };
    assert_eq!(directive.kind, DirectiveKind::SendMessage);
    assert_eq!(directive.text, "I'll let John know.");
    assert_eq!(directive.param("recipient"), Some("+15551234567"));
    assert_eq!(directive.param("content"), Some("Running late"));
    assert_eq!(directive.param("display_name"), Some("John"));
}

#[tokio::test]
async fn test_unknown_instruction_degrades_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Done.",
            "instruction": "ORDER_PIZZA",
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let reply = assert_ok!(backend.send_query(&QueryRequest::new("pizza")).await);
    assert_eq!(reply, BackendReply::text("Done."));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_error_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = assert_err!(backend.send_query(&QueryRequest::new("Hello")).await);

    assert_eq!(
        err,
        BackendError::Status {
            status: 503,
            body: "model loading".to_string(),
        }
    );
    assert!(matches!(ClientError::from(err), ClientError::Transport(_)));
}

#[tokio::test]
async fn test_garbage_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = assert_err!(backend.send_query(&QueryRequest::new("Hello")).await);
    assert!(matches!(err, BackendError::Protocol(_)));
}

#[tokio::test]
async fn test_reply_without_response_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "source": "ollama" })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = assert_err!(backend.send_query(&QueryRequest::new("Hello")).await);
    assert!(matches!(err, BackendError::Protocol(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    // Nothing listens on port 1
    let backend = HttpBackend::new(BackendConfig {
        probe_timeout: Duration::from_secs(1),
        query_timeout: Duration::from_secs(2),
        ..BackendConfig::new("http://127.0.0.1:1")
    })
    .unwrap();

    let err = assert_err!(backend.send_query(&QueryRequest::new("Hello")).await);
    assert!(matches!(err, BackendError::Transport(_)));

    let signal = backend.probe_availability().await;
    assert!(!signal.available);

    assert_err!(backend.probe_service().await);
}

#[tokio::test]
async fn test_slow_reply_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(BackendConfig {
        query_timeout: Duration::from_millis(300),
        ..BackendConfig::new(server.uri())
    })
    .unwrap();

    let err = assert_err!(backend.send_query(&QueryRequest::new("Hello")).await);
    assert!(matches!(err, BackendError::Transport(_)));
}

// =============================================================================
// Probes
// =============================================================================

#[tokio::test]
async fn test_availability_probe_reads_engine_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ollama/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ollama_available": true })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ollama/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ollama_available": false })),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    assert!(backend.probe_availability().await.available);
    assert!(!backend.probe_availability().await.available);
}

#[tokio::test]
async fn test_availability_probe_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ollama/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let signal = backend.probe_availability().await;
    assert!(!signal.available);
}

#[tokio::test]
async fn test_availability_probe_respects_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ollama/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ollama_available": true }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(BackendConfig {
        probe_timeout: Duration::from_millis(200),
        ..BackendConfig::new(server.uri())
    })
    .unwrap();

    assert!(!backend.probe_availability().await.available);
}

#[tokio::test]
async fn test_service_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "timestamp": "2026-01-01T00:00:00Z",
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let status = assert_ok!(backend.probe_service().await);
    assert!(status.is_ok());
    assert_eq!(status.timestamp.as_deref(), Some("2026-01-01T00:00:00Z"));
}
