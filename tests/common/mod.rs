// Simulated MCP server for integration tests.
//
// GET /sse streams whatever the test pushes; POST /messages/ records each
// body and answers through a per-test responder closure.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

pub const SESSION_PATH: &str = "/messages/?session_id=abc123";

/// What the server does with one POSTed message.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 202, nothing else.
    Accept,
    /// 202, then this frame goes out on the stream.
    Push(Value),
    /// 200 with this JSON body.
    Echo(Value),
    /// Reject with this status.
    Status(StatusCode),
    /// Hold the request open this long, then 202.
    Stall(Duration),
}

pub type Responder = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Posted {
    pub query: Option<String>,
    pub body: Value,
}

impl Posted {
    pub fn method(&self) -> &str {
        self.body["method"].as_str().unwrap_or("")
    }

    pub fn id(&self) -> Option<u64> {
        self.body.get("id").and_then(Value::as_u64)
    }
}

#[derive(Clone)]
struct ServerState {
    stream: Arc<Mutex<Option<mpsc::UnboundedReceiver<Option<Event>>>>>,
    frames: mpsc::UnboundedSender<Option<Event>>,
    posts: mpsc::UnboundedSender<Posted>,
    responder: Responder,
    sse_status: StatusCode,
}

pub struct MockMcpServer {
    addr: SocketAddr,
    frames: mpsc::UnboundedSender<Option<Event>>,
    posts: mpsc::UnboundedReceiver<Posted>,
}

impl MockMcpServer {
    pub async fn start(responder: Responder) -> Self {
        Self::start_with_status(responder, StatusCode::OK).await
    }

    /// `sse_status` other than 200 makes `GET /sse` fail with that status.
    pub async fn start_with_status(responder: Responder, sse_status: StatusCode) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (posts_tx, posts_rx) = mpsc::unbounded_channel();

        let state = ServerState {
            stream: Arc::new(Mutex::new(Some(frames_rx))),
            frames: frames_tx.clone(),
            posts: posts_tx,
            responder,
            sse_status,
        };

        let app = Router::new()
            .route("/sse", get(sse_handler))
            .route("/messages/", post(post_handler))
            .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            frames: frames_tx,
            posts: posts_rx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn push(&self, event: Event) {
        let _ = self.frames.send(Some(event));
    }

    pub fn push_json(&self, frame: Value) {
        self.push(Event::default().data(frame.to_string()));
    }

    pub fn announce_endpoint(&self) {
        self.push(Event::default().event("endpoint").data(SESSION_PATH));
    }

    /// End the SSE response body.
    pub fn close_stream(&self) {
        let _ = self.frames.send(None);
    }

    pub async fn next_post(&mut self) -> Posted {
        tokio::time::timeout(Duration::from_secs(5), self.posts.recv())
            .await
            .expect("no POST within 5s")
            .expect("post channel closed")
    }

    pub fn drain_posts(&mut self) -> Vec<Posted> {
        let mut out = Vec::new();
        while let Ok(p) = self.posts.try_recv() {
            out.push(p);
        }
        out
    }
}

async fn sse_handler(State(state): State<ServerState>) -> Response {
    if state.sse_status != StatusCode::OK {
        return (state.sse_status, "stream unavailable").into_response();
    }
    let Some(rx) = state.stream.lock().unwrap().take() else {
        return (StatusCode::CONFLICT, "stream already taken").into_response();
    };
    let events = UnboundedReceiverStream::new(rx)
        .take_while(|e| e.is_some())
        .map(|e| Ok::<Event, Infallible>(e.unwrap_or_default()));
    Sse::new(events).into_response()
}

async fn post_handler(
    State(state): State<ServerState>,
    RawQuery(query): RawQuery,
    Json(body): Json<Value>,
) -> Response {
    let _ = state.posts.send(Posted {
        query,
        body: body.clone(),
    });

    match (state.responder)(&body) {
        Reply::Accept => StatusCode::ACCEPTED.into_response(),
        Reply::Push(frame) => {
            let _ = state.frames.send(Some(Event::default().data(frame.to_string())));
            StatusCode::ACCEPTED.into_response()
        }
        Reply::Echo(frame) => (StatusCode::OK, Json(frame)).into_response(),
        Reply::Status(code) => (code, "rejected by test server").into_response(),
        Reply::Stall(delay) => {
            tokio::time::sleep(delay).await;
            StatusCode::ACCEPTED.into_response()
        }
    }
}

// ── Frames ──────────────────────────────────────────────────────────────────

pub fn result(id: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

pub fn error(id: &Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

pub fn initialize_ack() -> Value {
    result(
        &json!(0),
        json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "mock-mcp", "version": "0.1.0"},
        }),
    )
}

pub fn hello_world_tool() -> Value {
    json!({
        "name": "hello_world",
        "description": "Say hello",
        "inputSchema": {
            "type": "object",
            "properties": {"name": {"type": "string"}},
        },
    })
}

// ── Responders ──────────────────────────────────────────────────────────────

/// Acknowledge the handshake over the stream; everything else goes to `f`.
pub fn with_handshake<F>(f: F) -> Responder
where
    F: Fn(&Value) -> Reply + Send + Sync + 'static,
{
    Arc::new(move |body: &Value| match body["method"].as_str() {
        Some("initialize") => Reply::Push(initialize_ack()),
        Some("notifications/initialized") => Reply::Accept,
        _ => f(body),
    })
}

/// Answers every call on the stream with `{"method", "params"}` of the request.
pub fn mirror() -> Responder {
    with_handshake(|body| {
        Reply::Push(result(
            &body["id"],
            json!({"method": body["method"], "params": body["params"]}),
        ))
    })
}

/// A small tool server: `tools/list` advertises `hello_world`, `tools/call` runs it.
pub fn tool_server() -> Responder {
    with_handshake(|body| {
        let id = &body["id"];
        match body["method"].as_str() {
            Some("tools/list") => Reply::Push(result(id, json!({"tools": [hello_world_tool()]}))),
            Some("tools/call") => match body["params"]["name"].as_str() {
                Some("hello_world") => {
                    let who = body["params"]["arguments"]["name"].as_str().unwrap_or("world");
                    Reply::Push(result(
                        id,
                        json!({
                            "content": [{"type": "text", "text": format!("Hello, {who}!")}],
                            "isError": false,
                        }),
                    ))
                }
                other => Reply::Push(error(
                    id,
                    -32602,
                    &format!("Unknown tool: {}", other.unwrap_or("?")),
                )),
            },
            _ => Reply::Push(error(id, -32601, "Method not found")),
        }
    })
}

/// A base URL nothing listens on.
pub async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
