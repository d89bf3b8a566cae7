//! Integration tests for the HTTP API, driven through the router with stub
//! completion backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::stream;
use serde_json::{json, Value};
use tower::ServiceExt;

use gpt_gateway::config::Config;
use gpt_gateway::error::CompletionError;
use gpt_gateway::provider::{ChatCompletion, ChunkStream, CompletionRequest, ProviderRegistry};
use gpt_gateway::server::api::{build_router, AppState};

/// Deterministic backend: returns its chunks, or fails with `error`.
struct StubCompletion {
    chunks: Vec<&'static str>,
    error: Option<&'static str>,
    calls: AtomicUsize,
    last: Mutex<Option<CompletionRequest>>,
}

impl StubCompletion {
    fn chunks(chunks: Vec<&'static str>) -> Self {
        Self {
            chunks,
            error: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    fn failing(message: &'static str) -> Self {
        Self {
            error: Some(message),
            ..Self::chunks(vec![])
        }
    }

    fn record(&self, request: &CompletionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
    }
}

#[async_trait]
impl ChatCompletion for StubCompletion {
    async fn create(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.record(request);
        match self.error {
            Some(message) => Err(CompletionError::Upstream(message.to_string())),
            None => Ok(self.chunks.concat()),
        }
    }

    async fn create_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, CompletionError> {
        self.record(request);
        match self.error {
            Some(message) => Err(CompletionError::Upstream(message.to_string())),
            None => {
                let items: Vec<_> = self.chunks.iter().map(|c| Ok(c.to_string())).collect();
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}

fn app_with_config(stub: Arc<StubCompletion>, config: Config) -> Router {
    let registry = ProviderRegistry::new(stub);
    let state = AppState::new(Arc::new(config), registry).unwrap();
    build_router(Arc::new(state))
}

fn app(stub: Arc<StubCompletion>) -> Router {
    app_with_config(stub, Config::default())
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Parse an SSE body into the JSON payloads of its `data:` events.
fn sse_payloads(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter_map(|event| event.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

#[tokio::test]
async fn test_minimal_request_uses_defaults() {
    let stub = Arc::new(StubCompletion::chunks(vec!["Hello"]));
    let response = app(stub.clone())
        .oneshot(generate_request(json!({ "prompt": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["provider"], "ChatGLM");
    assert_eq!(body["mode"], "normal");
    assert!(body["response"].is_string());
    assert_eq!(body.as_object().unwrap().len(), 4);

    let last = stub.last.lock().unwrap().clone().unwrap();
    assert_eq!(last.messages.len(), 1);
    assert_eq!(last.messages[0].role, "user");
    assert_eq!(last.messages[0].content, "hi");
}

#[tokio::test]
async fn test_missing_prompt_is_rejected() {
    for body in [json!({}), json!({ "prompt": "" }), json!({ "model": "gpt-4" })] {
        let stub = Arc::new(StubCompletion::chunks(vec!["unused"]));
        let response = app(stub.clone())
            .oneshot(generate_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Prompt is required" }));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let stub = Arc::new(StubCompletion::chunks(vec!["unused"]));

    let plain = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("prompt=hi"))
        .unwrap();
    let response = app(stub.clone()).oneshot(plain).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Request must be JSON" }));

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"prompt\": "))
        .unwrap();
    let response = app(stub.clone()).oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Request must be JSON" }));

    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_fields_fall_back_to_defaults() {
    let stub = Arc::new(StubCompletion::chunks(vec!["ok"]));
    let response = app(stub)
        .oneshot(generate_request(json!({
            "prompt": "hi",
            "model": "gpt-5",
            "provider": "Bogus",
            "mode": "batch",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["provider"], "ChatGLM");
    assert_eq!(body["mode"], "normal");
}

#[tokio::test]
async fn test_valid_fields_are_forwarded() {
    let stub = Arc::new(StubCompletion::chunks(vec!["ok"]));
    let response = app(stub.clone())
        .oneshot(generate_request(json!({
            "prompt": "hi",
            "model": "gpt-4",
            "provider": "Qwen_Qwen_2_72B",
        })))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["model"], "gpt-4");
    assert_eq!(body["provider"], "Qwen_Qwen_2_72B");

    let last = stub.last.lock().unwrap().clone().unwrap();
    assert_eq!(last.provider.as_str(), "Qwen_Qwen_2_72B");
    assert_eq!(last.model.as_str(), "gpt-4");
}

#[tokio::test]
async fn test_normalized_fields_are_stable() {
    let stub = Arc::new(StubCompletion::chunks(vec!["same"]));
    let router = app(stub);
    let input = json!({ "prompt": "hi", "model": "gpt-4", "provider": "Websim" });

    let first = body_json(router.clone().oneshot(generate_request(input.clone())).await.unwrap()).await;
    let second = body_json(router.oneshot(generate_request(input)).await.unwrap()).await;

    for key in ["model", "provider", "mode"] {
        assert_eq!(first[key], second[key]);
    }
}

#[tokio::test]
async fn test_upstream_failure_is_reported_in_band() {
    let stub = Arc::new(StubCompletion::failing("provider offline"));
    let response = app(stub)
        .oneshot(generate_request(json!({ "prompt": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Error: ChatGLM - provider offline");
}

#[tokio::test]
async fn test_upstream_failure_status_is_configurable() {
    let mut config = Config::default();
    config.server.upstream_error_status = Some(502);

    let stub = Arc::new(StubCompletion::failing("provider offline"));
    let response = app_with_config(stub, config.clone())
        .oneshot(generate_request(json!({ "prompt": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Error: ChatGLM - provider offline");

    // Successful completions are unaffected.
    let stub = Arc::new(StubCompletion::chunks(vec!["fine"]));
    let response = app_with_config(stub, config)
        .oneshot(generate_request(json!({ "prompt": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_streaming_emits_one_event_per_chunk() {
    let stub = Arc::new(StubCompletion::chunks(vec!["A", "B"]));
    let response = app(stub)
        .oneshot(generate_request(json!({ "prompt": "hi", "mode": "streaming" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let body = body_string(response).await;
    assert_eq!(body, "data: {\"chunk\": \"A\"}\n\ndata: {\"chunk\": \"B\"}\n\n");
    assert_eq!(
        sse_payloads(&body),
        vec![json!({ "chunk": "A" }), json!({ "chunk": "B" })]
    );
}

#[tokio::test]
async fn test_streaming_failure_emits_single_error_event() {
    let stub = Arc::new(StubCompletion::failing("provider offline"));
    let response = app(stub)
        .oneshot(generate_request(json!({ "prompt": "hi", "mode": "streaming" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert_eq!(
        body,
        "data: {\"error\": \"Error: ChatGLM - provider offline\"}\n\n"
    );
}

#[tokio::test]
async fn test_index_page() {
    let stub = Arc::new(StubCompletion::chunks(vec![]));
    let response = app(stub)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));
    assert!(body_string(response).await.contains("/api/generate"));
}

#[tokio::test]
async fn test_providers_listing() {
    let stub = Arc::new(StubCompletion::chunks(vec![]));
    let response = app(stub)
        .oneshot(Request::builder().uri("/api/providers").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["models"], json!(["gpt-3.5-turbo", "gpt-4"]));
    assert_eq!(body["modes"], json!(["normal", "streaming"]));
    assert_eq!(body["providers"].as_array().unwrap().len(), 17);
    assert_eq!(body["defaults"]["provider"], "ChatGLM");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let stub = Arc::new(StubCompletion::chunks(vec!["ok"]));
    let router = app(stub);

    router
        .clone()
        .oneshot(generate_request(json!({ "prompt": "hi", "model": "nope" })))
        .await
        .unwrap();
    router
        .clone()
        .oneshot(generate_request(json!({})))
        .await
        .unwrap();

    let health = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health = body_json(health).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["providers"], 17);
    assert_eq!(health["debug"], false);

    let metrics = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let text = body_string(metrics).await;
    assert!(text.contains("gateway_requests_total{mode=\"normal\"} 1"));
    assert!(text.contains("gateway_defaulted_fields_total{field=\"model\"} 1"));
    assert!(text.contains("gateway_rejected_requests_total{reason=\"validation\"} 1"));
}
