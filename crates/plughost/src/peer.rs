//! # RPC Peer with Async Pump
//!
//! One `Peer` per connection between a host and a plugin runtime. It owns:
//!
//! - the local handler registry (`set`), keyed by proxy id;
//! - memoised proxies for the other side (`get_proxy`);
//! - the pending-call table that correlates replies by call id;
//! - the in-flight table of requests this side is currently answering.
//!
//! ## Architecture
//!
//! Two tasks are spawned in `new`:
//!
//! - **writer**: drains a FIFO of encoded frames into the transport. Every outbound frame
//!   (request, reply, notify, cancel) goes through it, so frames leave in the order they
//!   were produced.
//! - **pump**: reads frames and routes them. Replies resolve pending calls. Requests run
//!   on their own task so a slow handler never stalls the pump. Notifications run inline
//!   on the pump, which keeps per-entity deltas in arrival order.
//!
//! ## Invariants
//!
//! - Call ids start at 1 and are never reused on one connection.
//! - When the channel closes every pending call resolves with `Disconnected`; no call is
//!   left hanging.
//! - A caller that drops its call future removes the pending entry and sends `cancel`.
//!   The other side aborts the handler and never replies. A reply that was already on
//!   the wire is dropped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::AbortHandle;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;

use plugrpc::CallResult;
use plugrpc::FailureReason;
use plugrpc::Frame;
use plugrpc::Handler;
use plugrpc::Interface;
use plugrpc::ProxyIdentifier;
use plugrpc::Remote;
use plugrpc::Value;
use plugrpc::codec::decode_frame;
use plugrpc::codec::encode_frame;
use plugrpc::codec::peek_request_id;
use plugrpc::frame::reply_outcome;

use crate::config::HostConfig;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// A handler is already registered under this proxy id.
    DuplicateHandler(String),
}

impl std::fmt::Display for PeerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateHandler(id) => write!(f, "Handler already registered for {}", id),
        }
    }
}

impl std::error::Error for PeerError {}

pub type Result<T> = std::result::Result<T, PeerError>;

/// Sending half: shared by the peer, the pump and every proxy.
struct Outbound {
    peer_name: String,
    queue: mpsc::UnboundedSender<Vec<u8>>,
    pending: DashMap<u64, oneshot::Sender<CallResult<Value>>>,
    seq_gen: AtomicU64,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    call_timeout: Option<Duration>,
}

impl Outbound {
    fn enqueue(&self, frame: &Frame) -> CallResult<()> {
        let bytes = encode_frame(frame).map_err(FailureReason::from)?;
        self.queue.send(bytes).map_err(|_| FailureReason::Disconnected)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Marks the connection closed and rejects every pending call. Returns false if it
    /// was already closed.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let keys: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, tx)) = self.pending.remove(&key) {
                let _ = tx.send(Err(FailureReason::Disconnected));
            }
        }
        self.closed_tx.send_replace(true);
        true
    }
}

/// Removes an abandoned call's pending entry and tells the other side to stop.
struct CallGuard<'a> {
    outbound: &'a Outbound,
    call_id: u64,
    armed: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || self.outbound.pending.remove(&self.call_id).is_none() {
            return;
        }
        if self.outbound.is_closed() {
            return;
        }
        tracing::debug!(
            peer = %self.outbound.peer_name,
            call_id = self.call_id,
            "call abandoned, sending cancel"
        );
        let _ = self.outbound.enqueue(&Frame::cancel(self.call_id));
    }
}

#[async_trait::async_trait]
impl Remote for Outbound {
    async fn call(&self, proxy_id: &str, method: &str, args: Vec<Value>) -> CallResult<Value> {
        if self.is_closed() {
            return Err(FailureReason::Disconnected);
        }

        let call_id = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(call_id, tx);
        let mut guard = CallGuard { outbound: self, call_id, armed: true };

        // A close that raced the insert above would have missed this entry.
        if self.is_closed() {
            return Err(FailureReason::Disconnected);
        }

        tracing::debug!(peer = %self.peer_name, call_id, proxy = proxy_id, method, "request");
        self.enqueue(&Frame::request(call_id, proxy_id, method, args))?;

        let received = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => return Err(FailureReason::Timeout),
            },
            None => rx.await,
        };
        guard.armed = false;

        match received {
            Ok(outcome) => outcome,
            Err(_) => Err(FailureReason::Disconnected),
        }
    }

    fn notify(&self, proxy_id: &str, method: &str, args: Vec<Value>) {
        if self.is_closed() {
            tracing::debug!(peer = %self.peer_name, proxy = proxy_id, method, "notify after close dropped");
            return;
        }
        if let Err(e) = self.enqueue(&Frame::notify(proxy_id, method, args)) {
            tracing::warn!(peer = %self.peer_name, proxy = proxy_id, method, error = %e, "notify failed");
        }
    }
}

/// Receiving half: owned by the pump.
struct Inbound {
    peer_name: String,
    handlers: DashMap<&'static str, Arc<dyn Handler>>,
    running: DashMap<u64, AbortHandle>,
    outbound: Arc<Outbound>,
    max_frame_bytes: usize,
}

impl Inbound {
    fn handle_bytes(self: &Arc<Self>, bytes: &[u8]) {
        match decode_frame(bytes, self.max_frame_bytes) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => {
                tracing::warn!(peer = %self.peer_name, error = %e, "dropping malformed frame");
                if let Some(call_id) = peek_request_id(bytes) {
                    let _ = self
                        .outbound
                        .enqueue(&Frame::reply(call_id, Err(FailureReason::Codec(e.to_string()))));
                }
            }
        }
    }

    fn handle_frame(self: &Arc<Self>, frame: Frame) {
        match frame {
            Frame::Request { call_id, proxy_id, method, args } => {
                self.handle_request(call_id, proxy_id, method, args)
            }
            Frame::Notify { proxy_id, method, args } => self.handle_notify(&proxy_id, &method, args),
            Frame::Reply { call_id, result, error } => match self.outbound.pending.remove(&call_id) {
                Some((_, tx)) => {
                    let _ = tx.send(reply_outcome(result, error));
                }
                None => {
                    tracing::debug!(peer = %self.peer_name, call_id, "dropping reply for unknown call");
                }
            },
            Frame::Cancel { call_id } => {
                if let Some((_, handle)) = self.running.remove(&call_id) {
                    handle.abort();
                    tracing::debug!(peer = %self.peer_name, call_id, "request cancelled by caller");
                }
            }
        }
    }

    fn handle_request(self: &Arc<Self>, call_id: u64, proxy_id: String, method: String, args: Vec<Value>) {
        let handler = self.handlers.get(proxy_id.as_str()).map(|h| h.value().clone());
        let Some(handler) = handler else {
            tracing::warn!(peer = %self.peer_name, proxy = %proxy_id, method = %method, "no handler for request");
            let _ = self
                .outbound
                .enqueue(&Frame::reply(call_id, Err(FailureReason::HandlerNotFound(proxy_id))));
            return;
        };

        let inbound = self.clone();
        let (task, abort) = futures::future::abortable(async move {
            let outcome = AssertUnwindSafe(handler.call(&method, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(peer = %inbound.peer_name, proxy = %proxy_id, method = %method, %message, "handler panicked");
                    Err(FailureReason::failed(format!("handler panicked: {}", message)))
                });

            // A cancelled call has already been removed and must not be answered.
            if inbound.running.remove(&call_id).is_some() {
                if let Err(e) = inbound.outbound.enqueue(&Frame::reply(call_id, outcome)) {
                    tracing::debug!(peer = %inbound.peer_name, call_id, error = %e, "reply not sent");
                }
            }
        });
        self.running.insert(call_id, abort);
        tokio::spawn(task);
    }

    fn handle_notify(&self, proxy_id: &str, method: &str, args: Vec<Value>) {
        let handler = self.handlers.get(proxy_id).map(|h| h.value().clone());
        let Some(handler) = handler else {
            tracing::warn!(peer = %self.peer_name, proxy = proxy_id, method, "no handler for notification");
            return;
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| handler.notify(method, args))) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                tracing::warn!(peer = %self.peer_name, proxy = proxy_id, method, error = %reason, "notification failed");
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(peer = %self.peer_name, proxy = proxy_id, method, %message, "notification handler panicked");
            }
        }
    }

    fn abort_running(&self) {
        let keys: Vec<u64> = self.running.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, handle)) = self.running.remove(&key) {
                handle.abort();
            }
        }
    }
}

/// RPC peer with async message pump.
///
/// Must be created inside a tokio runtime. Dropping the peer closes the connection.
pub struct Peer {
    peer_name: String,
    inbound: Arc<Inbound>,
    outbound: Arc<Outbound>,
    proxies: DashMap<&'static str, Box<dyn Any + Send + Sync>>,
    tasks: Vec<tokio::task::AbortHandle>,
}

impl Peer {
    /// Creates a new peer and spawns the writer and pump tasks.
    /// The peer_name is used for logging and diagnostics.
    pub fn new(peer_name: impl Into<String>, transport: Box<dyn Transport>, config: &HostConfig) -> Self {
        let peer_name = peer_name.into();
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let (queue, mut queue_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (closed_tx, _) = watch::channel(false);

        let outbound = Arc::new(Outbound {
            peer_name: peer_name.clone(),
            queue,
            pending: DashMap::new(),
            seq_gen: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            closed_tx,
            call_timeout: config.call_timeout,
        });

        let inbound = Arc::new(Inbound {
            peer_name: peer_name.clone(),
            handlers: DashMap::new(),
            running: DashMap::new(),
            outbound: outbound.clone(),
            max_frame_bytes: config.max_frame_bytes,
        });

        let writer_transport = transport.clone();
        let writer_outbound = outbound.clone();
        let writer = tokio::spawn(async move {
            while let Some(bytes) = queue_rx.recv().await {
                if let Err(e) = writer_transport.send(&bytes).await {
                    tracing::warn!(peer = %writer_outbound.peer_name, error = %e, "transport send failed");
                    writer_outbound.close();
                    break;
                }
            }
        });
        let writer_abort = writer.abort_handle();

        let pump_inbound = inbound.clone();
        let pump_writer = writer_abort.clone();
        let pump = tokio::spawn(async move {
            let reason = loop {
                match transport.recv().await {
                    Ok(Some(bytes)) => pump_inbound.handle_bytes(&bytes),
                    Ok(None) => break "stream closed".to_string(),
                    Err(e) => break e.to_string(),
                }
            };
            if pump_inbound.outbound.close() {
                tracing::info!(peer = %pump_inbound.peer_name, %reason, "channel closed");
            }
            pump_inbound.abort_running();
            pump_writer.abort();
        });

        tracing::debug!(peer = %peer_name, "peer started");

        Self {
            peer_name,
            inbound,
            outbound,
            proxies: DashMap::new(),
            tasks: vec![writer_abort, pump.abort_handle()],
        }
    }

    /// Returns the peer name.
    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    /// Registers `instance` as the local implementation reachable under `id`.
    pub fn set<T: Interface + ?Sized>(&self, id: ProxyIdentifier<T>, instance: Arc<T>) -> Result<Arc<T>> {
        match self.inbound.handlers.entry(id.id()) {
            Entry::Occupied(_) => Err(PeerError::DuplicateHandler(id.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(T::handler(instance.clone(), id.id()));
                tracing::debug!(peer = %self.peer_name, proxy = id.id(), "handler registered");
                Ok(instance)
            }
        }
    }

    /// Returns the memoised proxy for the other side's implementation of `id`.
    ///
    /// Calls made before the other side registers a handler are answered with
    /// `HandlerNotFound`.
    pub fn get_proxy<T: Interface + ?Sized>(&self, id: ProxyIdentifier<T>) -> Arc<T> {
        let remote: Arc<dyn Remote> = self.outbound.clone();
        let entry = self
            .proxies
            .entry(id.id())
            .or_insert_with(|| -> Box<dyn Any + Send + Sync> { Box::new(T::proxy(remote.clone(), id.id())) });
        match entry.downcast_ref::<Arc<T>>() {
            Some(proxy) => proxy.clone(),
            None => T::proxy(remote, id.id()),
        }
    }

    /// The raw sending half, for callers that build frames without a typed proxy.
    pub fn remote(&self) -> Arc<dyn Remote> {
        self.outbound.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Resolves once the connection is closed, from either side.
    pub async fn closed(&self) {
        let mut rx = self.outbound.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Closes the connection: rejects pending calls, aborts in-flight handlers and stops
    /// both tasks. Idempotent.
    pub fn close(&self) {
        if self.outbound.close() {
            tracing::info!(peer = %self.peer_name, "peer closed");
        }
        self.inbound.abort_running();
        for task in &self.tasks {
            task.abort();
        }
    }

    /// Number of calls this side is waiting on.
    pub fn pending_calls(&self) -> usize {
        self.outbound.pending.len()
    }

    /// Number of requests from the other side currently being answered.
    pub fn running_requests(&self) -> usize {
        self.inbound.running.len()
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
