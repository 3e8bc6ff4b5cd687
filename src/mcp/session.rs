// ChatLLM API -- mcp/session
//! Handshake state machine.
//!
//! `Disconnected → AwaitingEndpoint → HandshakeInitiating → HandshakeAcked → Ready`,
//! with `Failed` reachable from every state and terminal. Transitions are
//! compare-and-set on a `watch` channel, so concurrent triggers cannot send
//! `initialize` twice and waiters wake without polling.
//!
//! The machine itself does no I/O: the listener performs the POSTs that each
//! step asks for.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use super::error::McpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    AwaitingEndpoint,
    HandshakeInitiating,
    HandshakeAcked,
    Ready,
    Failed(String),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::AwaitingEndpoint => "awaiting_endpoint",
            SessionState::HandshakeInitiating => "handshake_initiating",
            SessionState::HandshakeAcked => "handshake_acked",
            SessionState::Ready => "ready",
            SessionState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What the listener must do after feeding a frame for the reserved id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Initialize acknowledged: send `notifications/initialized`, then `mark_ready`.
    Acked,
    /// Server refused or answered without a result; the session is now failed.
    Rejected(String),
    /// Not expecting a handshake answer (duplicate or late); drop it.
    Ignored,
}

#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Disconnected);
        Self { tx }
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move `from → to` only if the current state equals `from`.
    fn transition(&self, from: &SessionState, to: SessionState) -> bool {
        let applied = self.tx.send_if_modified(|current| {
            if current == from {
                *current = to.clone();
                true
            } else {
                false
            }
        });
        if applied {
            tracing::debug!(from = from.name(), to = to.name(), "MCP: session transition");
        }
        applied
    }

    /// `Disconnected → AwaitingEndpoint`, done once when the client starts.
    pub fn begin(&self) -> bool {
        self.transition(&SessionState::Disconnected, SessionState::AwaitingEndpoint)
    }

    /// `AwaitingEndpoint → HandshakeInitiating`. Returns `true` for exactly one
    /// caller, which then owns sending `initialize`.
    pub fn on_endpoint(&self) -> bool {
        self.transition(&SessionState::AwaitingEndpoint, SessionState::HandshakeInitiating)
    }

    /// Feed the response frame for the reserved handshake id.
    pub fn on_handshake_frame(&self, frame: &Value) -> HandshakeStep {
        if self.state() != SessionState::HandshakeInitiating {
            return HandshakeStep::Ignored;
        }

        match frame.get("result") {
            Some(result) if result.is_object() => {
                if self.transition(&SessionState::HandshakeInitiating, SessionState::HandshakeAcked) {
                    tracing::info!(
                        "MCP: server accepted initialize (protocol version: {})",
                        result
                            .get("protocolVersion")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown")
                    );
                    HandshakeStep::Acked
                } else {
                    HandshakeStep::Ignored
                }
            }
            _ => {
                let reason = match frame.get("error") {
                    Some(err) => format!("initialize rejected: {err}"),
                    None => "initialize response carried no result".to_string(),
                };
                if self.fail(reason.clone()) {
                    HandshakeStep::Rejected(reason)
                } else {
                    HandshakeStep::Ignored
                }
            }
        }
    }

    /// `HandshakeAcked → Ready`, after `notifications/initialized` went out.
    pub fn mark_ready(&self) -> bool {
        let applied = self.transition(&SessionState::HandshakeAcked, SessionState::Ready);
        if applied {
            tracing::info!("MCP: session ready");
        }
        applied
    }

    /// Move to the terminal `Failed` state. Returns `false` if already failed.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let applied = self.tx.send_if_modified(|current| {
            if current.is_failed() {
                false
            } else {
                *current = SessionState::Failed(reason.clone());
                true
            }
        });
        if applied {
            tracing::error!("MCP: session failed: {}", reason);
        }
        applied
    }

    /// Suspend until the session is Ready, bounded by `wait`.
    pub async fn wait_ready(&self, wait: Duration) -> Result<(), McpError> {
        let mut rx = self.subscribe();
        let outcome = match tokio::time::timeout(wait, rx.wait_for(|s| s.is_ready() || s.is_failed())).await {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => return Err(McpError::connection("session state channel closed")),
            Err(_) => {
                return Err(McpError::connection(format!(
                    "session not ready after {}ms (state: {})",
                    wait.as_millis(),
                    self.state()
                )));
            }
        };

        match outcome {
            SessionState::Ready => Ok(()),
            SessionState::Failed(reason) => Err(McpError::Connection(reason)),
            other => Err(McpError::connection(format!("unexpected session state: {other}"))),
        }
    }
}
