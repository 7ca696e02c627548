//! Integration tests for terminals across a connected host and plugin runtime.

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use plughost::FailureReason;
use plughost::ext::types::TerminalOptions;

use common::Harness;
use common::wait_until;

fn named(name: &str) -> TerminalOptions {
    TerminalOptions { name: Some(name.into()), ..TerminalOptions::default() }
}

// --- Test 1: Create, send text and dispose ---
#[tokio::test]
async fn test_terminal_round_trip() {
    let h = Harness::new();
    let terminal = h.api.window.create_terminal(TerminalOptions {
        name: Some("build".into()),
        shell_path: Some("/bin/sh".into()),
        shell_args: Some(vec!["-l".into()]),
        ..TerminalOptions::default()
    });

    assert_eq!(terminal.process_id().await.unwrap(), 0);
    assert_eq!(h.terminals.count(), 1);
    let widget = h.terminals.widget(0);
    assert_eq!(widget.options.title.as_deref(), Some("build"));
    assert_eq!(widget.options.shell_args, vec!["-l".to_string()]);

    terminal.send_text("echo hi", true).unwrap();
    wait_until(|| widget.sent.lock().len() == 1).await;
    assert_eq!(widget.sent.lock()[0], "echo hi\r");

    terminal.dispose();
    wait_until(|| !h.main.terminals.contains(0)).await;
    assert!(widget.disposed.load(Ordering::SeqCst));
    wait_until(|| h.api.window.terminals().live_terminals() == 0).await;
}

// --- Test 2: Operations issued before the id arrives are kept in order ---
#[tokio::test]
async fn test_operations_queue_until_created() {
    let h = Harness::new();
    let terminal = h.api.window.create_terminal(named("queue"));
    terminal.send_text("one", false).unwrap();
    terminal.show(true).unwrap();
    terminal.send_text("two\nthree", false).unwrap();

    wait_until(|| h.terminals.count() == 1).await;
    let widget = h.terminals.widget(0);
    wait_until(|| widget.sent.lock().len() == 2).await;
    assert_eq!(*widget.sent.lock(), vec!["one".to_string(), "two\rthree".to_string()]);
    assert_eq!(widget.shown.load(Ordering::SeqCst), 1);
}

// --- Test 3: Disposed terminals reject further use ---
#[tokio::test]
async fn test_disposed_terminal_rejects_operations() {
    let h = Harness::new();
    let terminal = h.api.window.create_terminal(named("short-lived"));
    terminal.process_id().await.unwrap();

    terminal.dispose();
    terminal.dispose();
    assert!(terminal.is_disposed());

    let err = terminal.send_text("late", false).unwrap_err();
    assert!(err.is_disposed(), "Expected Disposed, got {:?}", err);
    assert!(terminal.hide().unwrap_err().is_disposed());
}

// --- Test 4: Ids are unique and never reused ---
#[tokio::test]
async fn test_terminal_ids_are_unique() {
    let h = Harness::new();
    let mut ids = Vec::new();
    for n in 0..5 {
        let terminal = h.api.window.create_terminal(named(&format!("t{}", n)));
        ids.push(terminal.process_id().await.unwrap());
        terminal.dispose();
    }
    wait_until(|| h.main.terminals.live_ids().is_empty()).await;

    let next = h.api.window.create_terminal(named("after"));
    ids.push(next.process_id().await.unwrap());

    let mut sorted = ids.clone();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
}

// --- Test 5: A host-side close reaches the plugin once ---
#[tokio::test]
async fn test_host_close_notifies_plugin() {
    let h = Harness::new();
    let closed = Arc::new(AtomicUsize::new(0));
    let _sub = h.api.window.on_did_close_terminal({
        let closed = closed.clone();
        move |terminal| {
            assert_eq!(terminal.name(), "closing");
            closed.fetch_add(1, Ordering::SeqCst);
        }
    });

    let terminal = h.api.window.create_terminal(named("closing"));
    let id = terminal.process_id().await.unwrap();

    let widget = h.terminals.widget(0);
    widget.close();
    widget.close();
    assert!(!h.main.terminals.contains(id));

    wait_until(|| closed.load(Ordering::SeqCst) == 1).await;
    assert!(terminal.is_disposed());
    assert!(terminal.send_text("gone", false).unwrap_err().is_disposed());

    // A dispose after the host closed it sends nothing and fires nothing.
    terminal.dispose();
    h.flush_to_main().await;
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

// --- Test 6: A failed creation surfaces on the handle and consumes no id ---
#[tokio::test]
async fn test_failed_creation() {
    let h = Harness::new();
    h.terminals.fail_next.store(true, Ordering::SeqCst);

    let broken = h.api.window.create_terminal(named("broken"));
    let err = broken.process_id().await.unwrap_err();
    match err {
        FailureReason::Failed(message) => assert!(message.contains("no pty available")),
        _ => panic!("Expected Failed, got {:?}", err),
    }

    let working = h.api.window.create_terminal(named("working"));
    assert_eq!(working.process_id().await.unwrap(), 0);
}

// --- Test 7: Operations on unknown ids are ignored by the host ---
#[tokio::test]
async fn test_unknown_terminal_operations_are_no_ops() {
    use plughost::protocol::ids;
    use plughost::protocol::interfaces::TerminalServiceMain;

    let h = Harness::new();
    let proxy = h.ext_peer.get_proxy(ids::TERMINAL_SERVICE_MAIN);
    proxy.send_text(42, "nobody".into(), true);
    proxy.show(42, false);
    proxy.dispose(42);
    h.flush_to_main().await;

    assert_eq!(h.terminals.count(), 0);
    assert!(h.main.terminals.live_ids().is_empty());
}
