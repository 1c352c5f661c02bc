use std::time::Duration;

use futures::StreamExt;
use recall_ai::{
    ChatMessage, ChatRequest, CompletionBackend, Error, OpenAICompatClient, OpenAIConfig, Role,
    StreamEvent,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OpenAICompatClient {
    OpenAICompatClient::new(OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".into()),
        request_timeout: Duration::from_secs(5),
        stream_idle_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn request() -> ChatRequest {
    ChatRequest::new(
        "test-model",
        vec![
            ChatMessage::text(Role::System, "be brief"),
            ChatMessage::text(Role::User, "hi"),
        ],
    )
}

fn sse(chunks: &[&str]) -> String {
    chunks
        .iter()
        .map(|data| format!("data: {}\n\n", data))
        .collect()
}

fn delta(text: &str) -> String {
    serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]}).to_string()
}

async fn collect(client: &OpenAICompatClient, request: &ChatRequest) -> Vec<StreamEvent> {
    client.stream(request).await.unwrap().collect().await
}

#[tokio::test]
async fn test_stream_relays_deltas_in_order() {
    let server = MockServer::start().await;
    let body = sse(&[
        r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        &delta("Hel"),
        &delta("lo"),
        "[DONE]",
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": true,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&client_for(&server), &request()).await;
    assert_eq!(
        events,
        vec![
            StreamEvent::delta("Hel"),
            StreamEvent::delta("lo"),
            StreamEvent::Done
        ]
    );
}

#[tokio::test]
async fn test_stream_stops_at_done_marker() {
    let server = MockServer::start().await;
    let body = sse(&[&delta("a"), "[DONE]", &delta("ignored")]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = collect(&client_for(&server), &request()).await;
    assert_eq!(events, vec![StreamEvent::delta("a"), StreamEvent::Done]);
}

#[tokio::test]
async fn test_stream_skips_malformed_chunks() {
    let server = MockServer::start().await;
    let body = sse(&[&delta("x"), "{broken", &delta("y"), "[DONE]"]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = collect(&client_for(&server), &request()).await;
    assert_eq!(
        events,
        vec![
            StreamEvent::delta("x"),
            StreamEvent::delta("y"),
            StreamEvent::Done
        ]
    );
}

#[tokio::test]
async fn test_stream_without_done_marker_ends_cleanly() {
    let server = MockServer::start().await;
    let body = sse(&[&delta("only")]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = collect(&client_for(&server), &request()).await;
    assert_eq!(events, vec![StreamEvent::delta("only"), StreamEvent::Done]);
}

#[tokio::test]
async fn test_stream_reports_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&client_for(&server), &request()).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { message } => {
            assert!(message.contains("500"), "message: {}", message);
            assert!(message.contains("model exploded"), "message: {}", message);
        }
        other => panic!("expected error event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_idle_timeout() {
    let server = MockServer::start().await;
    let body = sse(&[&delta("late"), "[DONE]"]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/event-stream")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = OpenAICompatClient::new(OpenAIConfig {
        base_url: server.uri(),
        api_key: None,
        request_timeout: Duration::from_secs(5),
        stream_idle_timeout: Duration::from_millis(100),
    })
    .unwrap();

    let events = collect(&client, &request()).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { message } => assert!(message.contains("timed out")),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_complete_returns_message_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  a summary \n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server).complete(&request()).await.unwrap();
    assert_eq!(text, "  a summary \n");
}

#[tokio::test]
async fn test_complete_sends_temperature_when_set() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"temperature": 0.25})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = request().with_temperature(Some(0.25));
    assert_eq!(client_for(&server).complete(&request).await.unwrap(), "ok");
}

#[tokio::test]
async fn test_complete_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert!(err.is_transport());
    match err {
        Error::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "busy");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_complete_missing_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_complete_unreachable_backend() {
    let client = OpenAICompatClient::new(OpenAIConfig {
        base_url: "http://127.0.0.1:9".into(),
        ..Default::default()
    })
    .unwrap();

    let err = client.complete(&request()).await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {:?}", err);
}
