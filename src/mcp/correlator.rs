// ChatLLM API -- mcp/correlator
//! Request correlator: matches responses arriving on the stream to the
//! callers waiting for them, by numeric id.
//!
//! Each dispatched request owns one `oneshot` slot in the pending table. The
//! slot leaves the table exactly once (resolution, timeout, POST rejection or
//! shutdown, whichever comes first), so late or duplicate frames find nothing
//! and are dropped. Once closed, the table refuses new slots: they resolve
//! immediately with the close reason. A [`PendingCall`] dropped before it is
//! answered (caller cancelled or aborted) removes its own slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use url::Url;

use super::error::McpError;
use super::jsonrpc::{
    classify_id, outcome_of, InboundId, JsonRpcRequest, RpcOutcome, HANDSHAKE_ID, INTERNAL_ERROR_CODE,
};
use super::transport::{PostOutcome, Transport};

type Slot = oneshot::Sender<Result<Value, McpError>>;

/// A request that has been registered (and usually sent) but not yet answered.
#[derive(Debug)]
pub struct PendingCall {
    id: u64,
    method: String,
    rx: oneshot::Receiver<Result<Value, McpError>>,
    table: Weak<Mutex<PendingTable>>,
}

impl PendingCall {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let removed = lock(&table).slots.remove(&self.id).is_some();
        if removed {
            tracing::debug!(id = self.id, method = %self.method, "MCP: caller went away, slot released");
        }
    }
}

#[derive(Debug, Default)]
struct PendingTable {
    slots: HashMap<u64, Slot>,
    closed: Option<String>,
}

#[derive(Debug)]
pub struct Correlator {
    next_id: AtomicU64,
    pending: Arc<Mutex<PendingTable>>,
}

fn lock(table: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::starting_at(HANDSHAKE_ID + 1)
    }

    fn starting_at(first: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first),
            pending: Arc::new(Mutex::new(PendingTable::default())),
        }
    }

    /// Next request id. Never returns the reserved handshake id, even after wrap-around.
    pub fn next_id(&self) -> u64 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != HANDSHAKE_ID {
                return id;
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        lock(&self.pending)
    }

    /// Allocate an id and register an empty slot for it.
    pub fn register(&self, method: &str) -> PendingCall {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.table();
            if let Some(reason) = table.closed.clone() {
                let _ = tx.send(Err(McpError::Connection(reason)));
            } else {
                table.slots.insert(id, tx);
            }
        }
        PendingCall {
            id,
            method: method.to_string(),
            rx,
            table: Arc::downgrade(&self.pending),
        }
    }

    /// Register a slot and POST the request. Transport failures resolve the
    /// slot immediately, so the caller always goes through [`wait`](Self::wait).
    pub async fn dispatch(&self, transport: &Transport, url: &Url, method: &str, params: Value) -> PendingCall {
        let call = self.register(method);
        if self.is_closed() {
            return call;
        }
        let body = JsonRpcRequest::new(call.id, method, params);

        tracing::debug!(id = call.id, method = %method, "MCP: dispatching request");

        match transport.post(url, &body).await {
            Ok(PostOutcome::Accepted) => {}
            Ok(PostOutcome::Echo(frame)) => {
                tracing::debug!(id = call.id, "MCP: synchronous response on POST");
                self.accept_echo(call.id, &frame);
            }
            Err(e) => {
                self.complete(call.id, Err(e));
            }
        }
        call
    }

    /// Suspend until the call's slot is resolved or `timeout` elapses.
    pub async fn wait(&self, mut call: PendingCall, timeout: Duration) -> Result<Value, McpError> {
        match tokio::time::timeout(timeout, &mut call.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(McpError::connection("client shut down before a response arrived")),
            Err(_) => {
                let removed = self.table().slots.remove(&call.id).is_some();
                if !removed {
                    // Resolved between the deadline firing and the removal.
                    if let Ok(outcome) = call.rx.try_recv() {
                        return outcome;
                    }
                }
                tracing::warn!(
                    id = call.id,
                    method = %call.method,
                    "MCP: no response after {}ms",
                    timeout.as_millis()
                );
                Err(McpError::Timeout {
                    method: call.method.clone(),
                    after: timeout,
                })
            }
        }
    }

    /// Resolve `call_id` from a response returned in a POST body, but only when
    /// the frame's own id names that call. Anything else is dropped.
    pub fn accept_echo(&self, call_id: u64, frame: &Value) -> bool {
        match classify_id(frame) {
            InboundId::Request(id) if id == call_id => self.resolve(call_id, frame),
            other => {
                tracing::warn!(id = call_id, "MCP: dropping POST echo carrying id {:?}", other);
                false
            }
        }
    }

    /// Deliver a response frame to the waiter registered under `id`.
    /// Returns `false` (and drops the frame) when no such waiter exists.
    pub fn resolve(&self, id: u64, frame: &Value) -> bool {
        let outcome = match outcome_of(frame) {
            RpcOutcome::Result(result) => Ok(result),
            RpcOutcome::Error(error) => Err(McpError::Remote(error)),
            RpcOutcome::Empty => Err(McpError::Remote(json!({
                "code": INTERNAL_ERROR_CODE,
                "message": "response carried neither result nor error",
            }))),
        };
        self.complete(id, outcome)
    }

    fn complete(&self, id: u64, outcome: Result<Value, McpError>) -> bool {
        let slot = self.table().slots.remove(&id);
        match slot {
            Some(tx) => {
                // Receiver gone means the caller stopped waiting; nothing to do.
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::debug!(id, "MCP: dropping response for unknown or expired request");
                false
            }
        }
    }

    /// Refuse new slots and resolve every pending waiter with a connection
    /// error. Returns how many waiters were failed.
    pub fn close(&self, reason: &str) -> usize {
        let drained: Vec<Slot> = {
            let mut table = self.table();
            if table.closed.is_none() {
                table.closed = Some(reason.to_string());
            }
            table.slots.drain().map(|(_, tx)| tx).collect()
        };
        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(McpError::connection(reason)));
        }
        if count > 0 {
            tracing::warn!("MCP: failed {} pending request(s): {}", count, reason);
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.table().closed.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.table().slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_skip_reserved() {
        let c = Correlator::new();
        assert_eq!(c.next_id(), 1);
        assert_eq!(c.next_id(), 2);

        let wrapping = Correlator::starting_at(u64::MAX);
        assert_eq!(wrapping.next_id(), u64::MAX);
        assert_eq!(wrapping.next_id(), 1);
    }

    #[tokio::test]
    async fn out_of_order_resolution() {
        let c = Correlator::new();
        let first = c.register("a");
        let second = c.register("b");
        assert_eq!(c.pending_count(), 2);

        assert!(c.resolve(second.id(), &json!({"id": 2, "result": "two"})));
        assert!(c.resolve(first.id(), &json!({"id": 1, "result": "one"})));

        let wait = Duration::from_secs(1);
        assert_eq!(c.wait(first, wait).await.unwrap(), json!("one"));
        assert_eq!(c.wait(second, wait).await.unwrap(), json!("two"));
        assert_eq!(c.pending_count(), 0);
    }

    #[tokio::test]
    async fn first_writer_wins() {
        let c = Correlator::new();
        let call = c.register("tools/list");
        let id = call.id();
        assert!(c.resolve(id, &json!({"id": id, "result": 1})));
        assert!(!c.resolve(id, &json!({"id": id, "result": 2})));
        assert_eq!(c.wait(call, Duration::from_secs(1)).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn remote_error_is_verbatim() {
        let c = Correlator::new();
        let call = c.register("tools/call");
        let err_obj = json!({"code": -32602, "message": "Invalid params", "data": {"field": "name"}});
        c.resolve(call.id(), &json!({"id": call.id(), "error": err_obj.clone()}));
        match c.wait(call, Duration::from_secs(1)).await {
            Err(McpError::Remote(v)) => assert_eq!(v, err_obj),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_response_is_remote_error() {
        let c = Correlator::new();
        let call = c.register("ping");
        c.resolve(call.id(), &json!({"id": call.id()}));
        let err = c.wait(call, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.remote_code(), Some(INTERNAL_ERROR_CODE));
    }

    #[tokio::test]
    async fn timeout_removes_slot_and_drops_late_frame() {
        let c = Correlator::new();
        let call = c.register("slow");
        let id = call.id();
        let err = c.wait(call, Duration::from_millis(20)).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(c.pending_count(), 0);
        assert!(!c.resolve(id, &json!({"id": id, "result": "late"})));
    }

    #[tokio::test]
    async fn close_drains_table_and_refuses_new_slots() {
        let c = Correlator::new();
        let a = c.register("a");
        let b = c.register("b");
        assert_eq!(c.close("listener stopped"), 2);
        assert!(c.wait(a, Duration::from_secs(1)).await.unwrap_err().is_connection());
        assert!(c.wait(b, Duration::from_secs(1)).await.unwrap_err().is_connection());

        let late = c.register("c");
        assert_eq!(c.pending_count(), 0);
        let err = c.wait(late, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "MCP connection error: listener stopped");
    }

    #[test]
    fn dropped_call_releases_its_slot() {
        let c = Correlator::new();
        let kept = c.register("kept");
        let abandoned = c.register("abandoned");
        let id = abandoned.id();
        assert_eq!(c.pending_count(), 2);

        drop(abandoned);
        assert_eq!(c.pending_count(), 1);
        assert!(!c.resolve(id, &json!({"id": id, "result": "late"})));
        assert!(c.resolve(kept.id(), &json!({"id": kept.id(), "result": "ok"})));
    }

    #[tokio::test]
    async fn cancelled_wait_releases_its_slot() {
        let c = Arc::new(Correlator::new());
        let call = c.register("tools/call");
        let waiter = tokio::spawn({
            let c = c.clone();
            async move { c.wait(call, Duration::from_secs(30)).await }
        });
        tokio::task::yield_now().await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn pending_call_outliving_correlator_is_harmless() {
        let c = Correlator::new();
        let call = c.register("orphan");
        drop(c);
        drop(call);
    }

    #[tokio::test]
    async fn echo_with_matching_id_resolves() {
        let c = Correlator::new();
        let call = c.register("tools/list");
        let id = call.id();
        assert!(c.accept_echo(id, &json!({"jsonrpc": "2.0", "id": id, "result": {"tools": []}})));
        assert_eq!(c.wait(call, Duration::from_secs(1)).await.unwrap(), json!({"tools": []}));
    }

    #[test]
    fn echo_with_other_id_is_dropped() {
        let c = Correlator::new();
        let call = c.register("tools/list");
        let id = call.id();

        assert!(!c.accept_echo(id, &json!({"id": id + 7, "result": "stray"})));
        assert!(!c.accept_echo(id, &json!({"id": HANDSHAKE_ID, "result": {}})));
        assert!(!c.accept_echo(id, &json!({"id": "abc", "result": "foreign"})));
        assert!(!c.accept_echo(id, &json!({"method": "notifications/progress"})));
        assert_eq!(c.pending_count(), 1);
        assert!(c.resolve(id, &json!({"id": id, "result": "real"})));
    }
}
