//! Test harness: a substitute upstream provider speaking the
//! OpenAI-compatible wire format, plus a relay bootstrapped against it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use relay_server::config::{CorsPolicy, RelayConfig};
use relay_server::{router, RelayState};
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// What the substitute provider does with a completion request.
#[derive(Clone)]
pub enum Upstream {
    /// Complete JSON response with this reply content.
    Reply(&'static str),
    /// SSE stream of these text deltas, terminated properly.
    Deltas(&'static [&'static str]),
    /// SSE stream that ends after these deltas without a terminator.
    Truncated(&'static [&'static str]),
    /// 500 with an OpenAI-shaped error body.
    Failure,
}

#[derive(Clone)]
struct MockState {
    behavior: Upstream,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

pub struct MockUpstream {
    pub base_url: String,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockUpstream {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request bodies the provider has received, in arrival order.
    pub async fn requests(&self) -> Vec<Value> {
        self.requests.lock().await.clone()
    }
}

pub async fn spawn_upstream(behavior: Upstream) -> MockUpstream {
    let calls = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        behavior,
        calls: calls.clone(),
        requests: requests.clone(),
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base_url: format!("http://{addr}/v1"),
        calls,
        requests,
    }
}

/// Boots a relay pointed at the given upstream and returns its base URL.
pub async fn spawn_relay(upstream_base: &str, streaming: bool, cors: CorsPolicy) -> String {
    let config = RelayConfig {
        api_key: "test-key".to_string(),
        base_url: upstream_base.to_string(),
        model: "test-bot".to_string(),
        cors,
        streaming,
        port: 0,
    };

    let app = router(RelayState::new(config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

async fn completions(State(state): State<MockState>, body: String) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    if let Ok(parsed) = serde_json::from_str::<Value>(&body) {
        state.requests.lock().await.push(parsed);
    }

    match state.behavior {
        Upstream::Failure => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": {
                    "message": "bot unavailable",
                    "type": "upstream_error",
                    "param": null,
                    "code": null
                }
            })),
        )
            .into_response(),
        Upstream::Reply(content) => axum::Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 0,
            "model": "test-bot",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop",
                "logprobs": null
            }]
        }))
        .into_response(),
        Upstream::Deltas(parts) => sse_response(parts, true),
        Upstream::Truncated(parts) => sse_response(parts, false),
    }
}

fn sse_response(parts: &[&str], terminate: bool) -> Response {
    let mut body = String::new();
    // Real providers open with a role-only delta carrying no text.
    body.push_str(&sse_event(&chunk(json!({"role": "assistant"}), None)));
    for part in parts {
        body.push_str(&sse_event(&chunk(json!({"content": part}), None)));
    }
    if terminate {
        body.push_str(&sse_event(&chunk(json!({}), Some("stop"))));
        body.push_str("data: [DONE]\n\n");
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from(body))
        .unwrap()
}

fn sse_event(data: &str) -> String {
    format!("data: {data}\n\n")
}

fn chunk(delta: Value, finish_reason: Option<&str>) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "created": 0,
        "model": "test-bot",
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason,
            "logprobs": null
        }]
    })
    .to_string()
}
