//! Tests for the OpenAI-compatible chat client against a local mock server.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use handbook_rag::config::ModelConfig;
use handbook_rag::llm::{ChatModel, ModelError, OpenAiChatModel};
use handbook_rag::models::Message;

/// Requests seen by the mock, and the statuses it should answer with in order.
#[derive(Clone, Default)]
struct Mock {
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
    statuses: Arc<Mutex<Vec<u16>>>,
}

async fn completions(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.requests.lock().unwrap().push((headers, body));
    let status = {
        let mut statuses = mock.statuses.lock().unwrap();
        if statuses.is_empty() {
            200
        } else {
            statuses.remove(0)
        }
    };
    if status == 200 {
        (
            StatusCode::OK,
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Fifteen days." } }]
            })),
        )
    } else {
        (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "error": { "message": "mock failure" } })),
        )
    }
}

async fn spawn_mock(mock: Mock) -> String {
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn model_config(endpoint: &str, max_retries: u32) -> ModelConfig {
    ModelConfig {
        endpoint: Some(endpoint.to_string()),
        api_key: Some("test-key".to_string()),
        max_retries,
        timeout_secs: 5,
        ..ModelConfig::default()
    }
}

fn conversation() -> Vec<Message> {
    vec![
        Message::system("You are a helpful assistant."),
        Message::user("How many vacation days?"),
    ]
}

#[tokio::test]
async fn test_complete_sends_decoding_config_and_auth() {
    let mock = Mock::default();
    let endpoint = spawn_mock(mock.clone()).await;
    let model = OpenAiChatModel::new(&model_config(&endpoint, 0)).unwrap();

    let reply = model.complete(&conversation()).await.unwrap();
    assert_eq!(reply, "Fifteen days.");

    let requests = mock.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];
    assert_eq!(headers["authorization"], "Bearer test-key");
    assert_eq!(headers["api-key"], "test-key");
    assert_eq!(body["model"], "gpt-4.1");
    assert_eq!(body["max_tokens"], 4096);
    assert_eq!(body["temperature"], 1.0);
    assert_eq!(body["top_p"], 1.0);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "How many vacation days?");
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock = Mock::default();
    mock.statuses.lock().unwrap().push(503);
    let endpoint = spawn_mock(mock.clone()).await;
    let model = OpenAiChatModel::new(&model_config(&endpoint, 1)).unwrap();

    let reply = model.complete(&conversation()).await.unwrap();
    assert_eq!(reply, "Fifteen days.");
    assert_eq!(mock.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock = Mock::default();
    mock.statuses.lock().unwrap().push(401);
    let endpoint = spawn_mock(mock.clone()).await;
    let model = OpenAiChatModel::new(&model_config(&endpoint, 3)).unwrap();

    let err = model.complete(&conversation()).await.unwrap_err();
    match err {
        ModelError::Api { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("mock failure"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(mock.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_error() {
    let mock = Mock::default();
    mock.statuses.lock().unwrap().extend([500, 500]);
    let endpoint = spawn_mock(mock.clone()).await;
    let model = OpenAiChatModel::new(&model_config(&endpoint, 1)).unwrap();

    let err = model.complete(&conversation()).await.unwrap_err();
    assert!(matches!(err, ModelError::Api { status: 500, .. }));
    assert_eq!(mock.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_zero_retries_returns_first_error() {
    let mock = Mock::default();
    mock.statuses.lock().unwrap().extend([503]);
    let endpoint = spawn_mock(mock.clone()).await;
    let model = OpenAiChatModel::new(&model_config(&endpoint, 0)).unwrap();

    let err = model.complete(&conversation()).await.unwrap_err();
    assert!(matches!(err, ModelError::Api { status: 503, .. }));
    assert_eq!(mock.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let model = OpenAiChatModel::new(&model_config(&endpoint, 0)).unwrap();
    let err = model.complete(&conversation()).await.unwrap_err();
    assert!(matches!(err, ModelError::Http(_)));
}
