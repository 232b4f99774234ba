use super::*;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

#[derive(Debug)]
struct CapturedRequest {
    headers: HeaderMap,
    body: serde_json::Value,
}

#[derive(Clone)]
struct ProviderState {
    status: StatusCode,
    reply: String,
    tx: Arc<Mutex<Option<oneshot::Sender<CapturedRequest>>>>,
}

async fn handle_completion(
    State(state): State<ProviderState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(CapturedRequest { headers, body });
    }
    (state.status, state.reply.clone())
}

async fn spawn_provider(
    status: StatusCode,
    reply: &str,
) -> anyhow::Result<(String, oneshot::Receiver<CapturedRequest>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    let state = ProviderState {
        status,
        reply: reply.to_string(),
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/api/v1/chat/completions", post(handle_completion))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api/v1/chat/completions"), rx))
}

fn request() -> GenerationRequest {
    GenerationRequest {
        api_key: "sk-or-v1-test".to_string(),
        model: "z-ai/glm-4.7".to_string(),
        prompt: "Continue:\nINT. BAR".to_string(),
    }
}

#[tokio::test]
async fn sends_expected_headers_and_body() {
    let (endpoint, captured_rx) = spawn_provider(
        StatusCode::OK,
        r#"{"choices":[{"message":{"role":"assistant","content":"SAM: Another round."}}]}"#,
    )
    .await
    .expect("spawn provider");
    let client = CompletionClient::new(endpoint, "https://bench.example", "DramaBench Interactive Demo");

    let text = client.complete(&request()).await.expect("complete");
    assert_eq!(text, "SAM: Another round.");

    let captured = captured_rx.await.expect("captured");
    assert_eq!(
        captured.headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer sk-or-v1-test")
    );
    assert_eq!(
        captured.headers.get("http-referer").and_then(|v| v.to_str().ok()),
        Some("https://bench.example")
    );
    assert_eq!(
        captured.headers.get("x-title").and_then(|v| v.to_str().ok()),
        Some("DramaBench Interactive Demo")
    );
    assert_eq!(captured.body["model"], "z-ai/glm-4.7");
    assert_eq!(captured.body["max_tokens"], 4000);
    assert_eq!(captured.body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(captured.body["messages"][0]["role"], "user");
    assert_eq!(captured.body["messages"][0]["content"], "Continue:\nINT. BAR");
}

#[tokio::test]
async fn surfaces_provider_error_message() {
    let (endpoint, _rx) = spawn_provider(
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error":{"message":"rate limited"}}"#,
    )
    .await
    .expect("spawn provider");
    let client = CompletionClient::new(endpoint, "app://test", "t");

    let err = client.complete(&request()).await.expect_err("must fail");
    assert_eq!(err.to_string(), "rate limited");
    assert_eq!(err.provider_code(), Some(ErrorCode::RateLimited));
    assert!(!err.is_precondition());
}

#[tokio::test]
async fn falls_back_to_status_when_error_body_has_no_message() {
    let (endpoint, _rx) = spawn_provider(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
        .await
        .expect("spawn provider");
    let client = CompletionClient::new(endpoint, "app://test", "t");

    let err = client.complete(&request()).await.expect_err("must fail");
    assert_eq!(err.to_string(), "API request failed: 502");
    match err {
        GenerationError::Provider { status, .. } => assert_eq!(status, 502),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_are_a_malformed_response() {
    let (endpoint, _rx) = spawn_provider(StatusCode::OK, r#"{"choices":[]}"#)
        .await
        .expect("spawn provider");
    let client = CompletionClient::new(endpoint, "app://test", "t");

    let err = client.complete(&request()).await.expect_err("must fail");
    assert!(matches!(err, GenerationError::MalformedResponse(_)));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = CompletionClient::new(format!("http://{addr}/v1"), "app://test", "t");
    let err = client.complete(&request()).await.expect_err("must fail");
    assert!(matches!(err, GenerationError::Transport(_)));
}

#[test]
fn provider_error_parsing_handles_other_shapes() {
    assert_eq!(
        provider_error(401, r#"{"error":{"message":"No auth credentials found","code":401}}"#).message,
        "No auth credentials found"
    );
    assert_eq!(provider_error(500, r#"{"error":{}}"#).message, "API request failed: 500");
    assert_eq!(provider_error(500, r#"{"error":{"message":""}}"#).message, "API request failed: 500");
    assert_eq!(provider_error(404, "").code, ErrorCode::Validation);
}
