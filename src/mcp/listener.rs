// ChatLLM API -- mcp/listener
//! Inbound half of the split channel.
//!
//! One task per client holds the SSE stream open, classifies frames and routes
//! them: endpoint announcements and the reserved-id response drive the
//! handshake, everything else goes to the correlator. The same task enforces
//! the handshake deadlines. It exits on shutdown, end of stream, a read error
//! or a failed handshake; no reconnect is attempted.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use super::client::Inner;
use super::frame::{callback_url, classify, Frame, SseEvent, SseParser};
use super::jsonrpc::{
    classify_id, initialize_params, InboundId, JsonRpcNotification, JsonRpcRequest, HANDSHAKE_ID,
    METHOD_INITIALIZE, METHOD_INITIALIZED,
};
use super::session::{HandshakeStep, SessionState};
use super::transport::PostOutcome;

/// Why the listener stopped.
#[derive(Debug)]
enum Exit {
    Shutdown,
    Failed(String),
}

pub(crate) fn spawn(inner: Arc<Inner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match run(&inner).await {
            Exit::Shutdown => {
                tracing::info!("MCP: listener stopped (shutdown)");
                inner.session.fail("client shut down");
                inner.correlator.close("client shut down");
            }
            Exit::Failed(reason) => {
                inner.session.fail(reason.clone());
                inner.correlator.close(&reason);
            }
        }
    })
}

async fn run(inner: &Inner) -> Exit {
    let started = Instant::now();
    let cfg = &inner.config;

    let open = inner
        .transport
        .http()
        .get(inner.stream_url.clone())
        .header("Accept", "text/event-stream")
        .send();

    let response = tokio::select! {
        _ = inner.cancel.cancelled() => return Exit::Shutdown,
        opened = tokio::time::timeout(cfg.endpoint_timeout, open) => match opened {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return Exit::Failed(format!("could not open SSE stream '{}': {}", inner.stream_url, e));
            }
            Err(_) => {
                return Exit::Failed(format!(
                    "SSE stream '{}' not opened within {}ms",
                    inner.stream_url,
                    cfg.endpoint_timeout.as_millis()
                ));
            }
        },
    };

    let status = response.status();
    if !status.is_success() {
        return Exit::Failed(format!("SSE stream '{}' returned HTTP {}", inner.stream_url, status));
    }
    tracing::info!("MCP: connected to SSE stream {}", inner.stream_url);

    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    // Endpoint budget runs from start; replaced by the ack budget once the endpoint arrives.
    let mut deadline = started + cfg.endpoint_timeout;

    loop {
        let awaiting_handshake = !inner.session.state().is_ready();

        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return Exit::Shutdown,
            _ = tokio::time::sleep_until(deadline), if awaiting_handshake => {
                return Exit::Failed(deadline_reason(inner));
            }
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(&bytes) {
                            if let Some(exit) = handle_event(inner, &event, &mut deadline).await {
                                return exit;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("MCP: SSE read error: {}", e);
                        return Exit::Failed(format!("SSE stream read error: {e}"));
                    }
                    None => {
                        for event in parser.flush() {
                            if let Some(exit) = handle_event(inner, &event, &mut deadline).await {
                                return exit;
                            }
                        }
                        tracing::warn!("MCP: SSE stream closed by server");
                        return Exit::Failed("SSE stream closed by server".to_string());
                    }
                }
            }
        }
    }
}

fn deadline_reason(inner: &Inner) -> String {
    match inner.session.state() {
        SessionState::AwaitingEndpoint => format!(
            "no endpoint announced within {}ms",
            inner.config.endpoint_timeout.as_millis()
        ),
        SessionState::HandshakeInitiating | SessionState::HandshakeAcked => format!(
            "initialize not acknowledged within {}ms",
            inner.config.handshake_timeout.as_millis()
        ),
        other => format!("handshake deadline passed in state {other}"),
    }
}

async fn handle_event(inner: &Inner, event: &SseEvent, deadline: &mut Instant) -> Option<Exit> {
    match classify(event, &inner.config.endpoint_prefix) {
        Frame::Endpoint(announced) => on_endpoint(inner, &announced, deadline).await,
        Frame::Message(frame) => on_message(inner, &frame, *deadline).await,
        Frame::Ignored(reason) => {
            tracing::debug!(?reason, "MCP: ignoring stream frame");
            None
        }
    }
}

async fn on_endpoint(inner: &Inner, announced: &str, deadline: &mut Instant) -> Option<Exit> {
    let url = match callback_url(&inner.base, announced) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("MCP: ignoring unusable endpoint '{}': {}", announced, e);
            return None;
        }
    };

    if inner.endpoint.set(url.clone()).is_err() {
        tracing::debug!("MCP: endpoint already known, ignoring '{}'", announced);
        return None;
    }
    tracing::info!("MCP: messages endpoint {}", url);

    if !inner.session.on_endpoint() {
        return None;
    }
    *deadline = Instant::now() + inner.config.handshake_timeout;

    let params = initialize_params(
        &inner.config.protocol_version,
        &inner.config.client_name,
        &inner.config.client_version,
    );
    let body = JsonRpcRequest::new(HANDSHAKE_ID, METHOD_INITIALIZE, params);

    match post_handshake(inner, &url, &body, *deadline, METHOD_INITIALIZE).await {
        Ok(PostOutcome::Accepted) => None,
        Ok(PostOutcome::Echo(frame)) => match classify_id(&frame) {
            InboundId::Handshake => on_handshake(inner, &frame, *deadline).await,
            other => {
                tracing::warn!("MCP: dropping synchronous initialize response with id {:?}", other);
                None
            }
        },
        Err(exit) => Some(exit),
    }
}

/// POST a handshake message without losing sight of shutdown or the
/// handshake deadline while the request is in flight.
async fn post_handshake<T: Serialize + ?Sized>(
    inner: &Inner,
    url: &Url,
    body: &T,
    deadline: Instant,
    method: &str,
) -> Result<PostOutcome, Exit> {
    tokio::select! {
        biased;
        _ = inner.cancel.cancelled() => Err(Exit::Shutdown),
        _ = tokio::time::sleep_until(deadline) => Err(Exit::Failed(deadline_reason(inner))),
        posted = inner.transport.post(url, body) => {
            posted.map_err(|e| Exit::Failed(format!("{method} not accepted: {e}")))
        }
    }
}

async fn on_message(inner: &Inner, frame: &Value, deadline: Instant) -> Option<Exit> {
    match classify_id(frame) {
        InboundId::Handshake => on_handshake(inner, frame, deadline).await,
        InboundId::Request(id) => {
            inner.correlator.resolve(id, frame);
            None
        }
        InboundId::Notification => {
            tracing::debug!(
                method = frame.get("method").and_then(|m| m.as_str()).unwrap_or("?"),
                "MCP: server notification"
            );
            None
        }
        InboundId::Foreign(id) => {
            tracing::debug!("MCP: dropping frame with foreign id {}", id);
            None
        }
    }
}

async fn on_handshake(inner: &Inner, frame: &Value, deadline: Instant) -> Option<Exit> {
    match inner.session.on_handshake_frame(frame) {
        HandshakeStep::Acked => {
            let Some(url) = inner.endpoint.get() else {
                return Some(Exit::Failed("initialize acknowledged before an endpoint was known".into()));
            };
            let notification = JsonRpcNotification::new(METHOD_INITIALIZED);
            if let Err(exit) = post_handshake(inner, url, &notification, deadline, METHOD_INITIALIZED).await {
                return Some(exit);
            }
            inner.session.mark_ready();
            None
        }
        HandshakeStep::Rejected(reason) => Some(Exit::Failed(reason)),
        HandshakeStep::Ignored => {
            tracing::debug!("MCP: dropping unexpected handshake frame");
            None
        }
    }
}
