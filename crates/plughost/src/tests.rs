//! Peer tests over in-process channels.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use plugrpc::CallResult;
use plugrpc::FailureReason;
use plugrpc::ProxyIdentifier;
use plugrpc::Remote;
use plugrpc::rpc_interface;

use crate::channel::DuplexChannelTransport;
use crate::config::HostConfig;
use crate::peer::Peer;
use crate::peer::PeerError;

rpc_interface! {
    pub trait ProbeService: proxy ProbeServiceProxy, dispatch ProbeServiceDispatch {
        requests {
            fn echo(&self, text: String) -> String;
            fn delayed(&self, tag: u32, delay_ms: u64) -> u32;
            fn reject(&self) -> ();
            fn explode(&self) -> ();
            fn park(&self) -> ();
        }
        notifications {
            fn record(&self, value: u32);
            fn explode_quietly(&self);
        }
    }
}

const PROBE: ProxyIdentifier<dyn ProbeService> = ProxyIdentifier::new("ProbeService");

#[derive(Default)]
struct Probe {
    recorded: Mutex<Vec<u32>>,
    parked: AtomicUsize,
    parked_dropped: Arc<AtomicUsize>,
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ProbeService for Probe {
    async fn echo(&self, text: String) -> CallResult<String> {
        Ok(text)
    }

    async fn delayed(&self, tag: u32, delay_ms: u64) -> CallResult<u32> {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(tag)
    }

    async fn reject(&self) -> CallResult<()> {
        Err(FailureReason::disposed("Probe"))
    }

    async fn explode(&self) -> CallResult<()> {
        panic!("probe exploded");
    }

    async fn park(&self) -> CallResult<()> {
        let _counter = DropCounter(self.parked_dropped.clone());
        self.parked.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }

    fn record(&self, value: u32) {
        self.recorded.lock().push(value);
    }

    fn explode_quietly(&self) {
        panic!("notification exploded");
    }
}

fn connect() -> (Peer, Peer, Arc<Probe>) {
    let (a, b) = DuplexChannelTransport::pair();
    let config = HostConfig::standard();
    let main = Peer::new("main", Box::new(a), &config);
    let ext = Peer::new("ext", Box::new(b), &config);
    let probe = Arc::new(Probe::default());
    let handler: Arc<dyn ProbeService> = probe.clone();
    ext.set(PROBE, handler).unwrap();
    (main, ext, probe)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
//  REQUESTS
// ============================================================================

#[tokio::test]
async fn test_request_round_trip() {
    let (main, _ext, _probe) = connect();
    let proxy = main.get_proxy(PROBE);

    assert_eq!(proxy.echo("hello".into()).await.unwrap(), "hello");
    assert_eq!(main.pending_calls(), 0);
}

#[tokio::test]
async fn test_proxy_is_memoised() {
    let (main, _ext, _probe) = connect();
    let first = main.get_proxy(PROBE);
    let second = main.get_proxy(PROBE);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_concurrent_replies_reach_their_callers() {
    let (main, _ext, _probe) = connect();
    let proxy = main.get_proxy(PROBE);

    // --- Test 1: staggered latencies complete out of order ---
    let mut rng = rand::thread_rng();
    let calls: Vec<_> = (0..32u32)
        .map(|tag| {
            let proxy = proxy.clone();
            let delay = rng.gen_range(0..40u64);
            tokio::spawn(async move { (tag, proxy.delayed(tag, delay).await) })
        })
        .collect();

    for call in calls {
        let (tag, result) = call.await.unwrap();
        assert_eq!(result.unwrap(), tag);
    }

    // --- Test 2: nothing left behind ---
    assert_eq!(main.pending_calls(), 0);
}

#[tokio::test]
async fn test_unknown_proxy_is_handler_not_found() {
    let (main, _ext, _probe) = connect();
    let err = main.remote().call("Nobody", "$echo", vec![]).await.unwrap_err();
    match err {
        FailureReason::HandlerNotFound(id) => assert_eq!(id, "Nobody"),
        _ => panic!("Expected HandlerNotFound, got {:?}", err),
    }
}

#[tokio::test]
async fn test_unknown_method_and_bad_arguments() {
    let (main, _ext, _probe) = connect();

    let err = main.remote().call("ProbeService", "$nope", vec![]).await.unwrap_err();
    match err {
        FailureReason::MethodNotFound { .. } => {}
        _ => panic!("Expected MethodNotFound, got {:?}", err),
    }

    let err = main.remote().call("ProbeService", "$echo", vec![serde_json::json!(42)]).await.unwrap_err();
    match err {
        FailureReason::BadArguments(_) => {}
        _ => panic!("Expected BadArguments, got {:?}", err),
    }
}

#[tokio::test]
async fn test_handler_error_crosses_the_wire() {
    let (main, _ext, _probe) = connect();
    let err = main.get_proxy(PROBE).reject().await.unwrap_err();
    assert!(err.is_disposed());
}

#[tokio::test]
async fn test_handler_panic_becomes_failure() {
    let (main, _ext, _probe) = connect();
    let proxy = main.get_proxy(PROBE);

    let err = proxy.explode().await.unwrap_err();
    match err {
        FailureReason::Failed(message) => assert!(message.contains("probe exploded")),
        _ => panic!("Expected Failed, got {:?}", err),
    }

    // The connection survives.
    assert_eq!(proxy.echo("still here".into()).await.unwrap(), "still here");
}

#[tokio::test]
async fn test_duplicate_handler_is_rejected() {
    let (_main, ext, _probe) = connect();
    let handler: Arc<dyn ProbeService> = Arc::new(Probe::default());
    match ext.set(PROBE, handler) {
        Err(PeerError::DuplicateHandler(id)) => assert_eq!(id, "ProbeService"),
        other => panic!("Expected DuplicateHandler, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
//  NOTIFICATIONS
// ============================================================================

#[tokio::test]
async fn test_notifications_arrive_in_order() {
    let (main, _ext, probe) = connect();
    let proxy = main.get_proxy(PROBE);

    for value in 0..100 {
        proxy.record(value);
    }
    // A request sent after the notifications is answered after they were applied.
    proxy.echo("sync".into()).await.unwrap();

    assert_eq!(*probe.recorded.lock(), (0..100).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_notification_panic_does_not_stop_the_pump() {
    let (main, _ext, probe) = connect();
    let proxy = main.get_proxy(PROBE);

    proxy.explode_quietly();
    proxy.record(7);
    proxy.echo("sync".into()).await.unwrap();

    assert_eq!(*probe.recorded.lock(), vec![7]);
}

// ============================================================================
//  CLOSE AND CANCEL
// ============================================================================

#[tokio::test]
async fn test_close_rejects_pending_calls() {
    let (main, ext, probe) = connect();
    let proxy = main.get_proxy(PROBE);

    let call = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.park().await }
    });
    wait_until(|| probe.parked.load(Ordering::SeqCst) == 1).await;

    // --- Test 1: closing the other side disconnects the caller ---
    drop(ext);
    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err, FailureReason::Disconnected);

    // --- Test 2: later calls fail immediately ---
    main.closed().await;
    assert!(main.is_closed());
    assert_eq!(proxy.echo("late".into()).await.unwrap_err(), FailureReason::Disconnected);
}

#[tokio::test]
async fn test_dropped_call_cancels_remote_handler() {
    let (main, ext, probe) = connect();
    let proxy = main.get_proxy(PROBE);

    let call = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.park().await }
    });
    wait_until(|| probe.parked.load(Ordering::SeqCst) == 1).await;
    assert_eq!(ext.running_requests(), 1);

    call.abort();
    let _ = call.await;

    wait_until(|| probe.parked_dropped.load(Ordering::SeqCst) == 1).await;
    assert_eq!(ext.running_requests(), 0);
    assert_eq!(main.pending_calls(), 0);
    assert_eq!(proxy.echo("after".into()).await.unwrap(), "after");
}

#[tokio::test]
async fn test_call_timeout() {
    let (a, b) = DuplexChannelTransport::pair();
    let config = HostConfig::builder().call_timeout(Duration::from_millis(20)).build();
    let main = Peer::new("main", Box::new(a), &config);
    let ext = Peer::new("ext", Box::new(b), &HostConfig::standard());
    let handler: Arc<dyn ProbeService> = Arc::new(Probe::default());
    ext.set(PROBE, handler).unwrap();

    let err = main.get_proxy(PROBE).park().await.unwrap_err();
    assert_eq!(err, FailureReason::Timeout);
    assert_eq!(main.pending_calls(), 0);
}
