use std::sync::Arc;
use std::sync::Mutex;

use serde_json::json;
use serde_json::Value;

use crate::codec::decode_frame;
use crate::codec::encode_frame;
use crate::codec::peek_request_id;
use crate::codec::ArgsDecoder;
use crate::codec::ArgsEncoder;
use crate::codec::DEFAULT_MAX_FRAME_BYTES;
use crate::frame::reply_outcome;
use crate::*;

// ============================================================================
//  FRAMES
// ============================================================================

#[test]
fn test_request_wire_shape() {
    let frame = Frame::request(7, "TerminalServiceMain", "$create_terminal", vec![json!({"title": "t"})]);
    let bytes = encode_frame(&frame).unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["kind"], "request");
    assert_eq!(value["callId"], 7);
    assert_eq!(value["proxyId"], "TerminalServiceMain");
    assert_eq!(value["method"], "$create_terminal");
    assert_eq!(value["args"][0]["title"], "t");

    assert_eq!(decode_frame(&bytes, DEFAULT_MAX_FRAME_BYTES).unwrap(), frame);
}

#[test]
fn test_reply_error_wire_shape() {
    let frame = Frame::reply(3, Err(FailureReason::disposed("TextEditor(e1)")));
    let bytes = encode_frame(&frame).unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["kind"], "reply");
    assert!(value.get("result").is_none());
    assert_eq!(value["error"]["kind"], "disposed");
    assert_eq!(value["error"]["detail"], "TextEditor(e1)");
}

#[test]
fn test_reply_null_result_is_ok() {
    let bytes = br#"{"kind":"reply","callId":1,"result":null}"#;
    match decode_frame(bytes, DEFAULT_MAX_FRAME_BYTES).unwrap() {
        Frame::Reply { call_id, result, error } => {
            assert_eq!(call_id, 1);
            assert_eq!(reply_outcome(result, error), Ok(Value::Null));
        }
        other => panic!("Expected Reply, got {:?}", other),
    }

    // A reply with neither field is also a null result.
    let bytes = br#"{"kind":"reply","callId":2}"#;
    match decode_frame(bytes, DEFAULT_MAX_FRAME_BYTES).unwrap() {
        Frame::Reply { result, error, .. } => assert_eq!(reply_outcome(result, error), Ok(Value::Null)),
        other => panic!("Expected Reply, got {:?}", other),
    }
}

#[test]
fn test_notify_and_cancel_have_expected_call_ids() {
    assert_eq!(Frame::notify("X", "$m", vec![]).call_id(), None);
    assert_eq!(Frame::cancel(9).call_id(), Some(9));

    let bytes = encode_frame(&Frame::cancel(9)).unwrap();
    assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#"{"kind":"cancel","callId":9}"#);
}

#[test]
fn test_err_unknown_kind() {
    let bytes = br#"{"kind":"shout","callId":1}"#;
    match decode_frame(bytes, DEFAULT_MAX_FRAME_BYTES) {
        Err(RpcError::ProtocolViolation(_)) => {}
        other => panic!("Expected ProtocolViolation, got {:?}", other),
    }
}

#[test]
fn test_err_not_json() {
    match decode_frame(b"\x00\x01garbage", DEFAULT_MAX_FRAME_BYTES) {
        Err(RpcError::Serialization(_)) => {}
        other => panic!("Expected Serialization, got {:?}", other),
    }
}

#[test]
fn test_err_payload_too_large() {
    let frame = Frame::notify("X", "$m", vec![json!("a".repeat(64))]);
    let bytes = encode_frame(&frame).unwrap();
    match decode_frame(&bytes, 16) {
        Err(RpcError::PayloadTooLarge { size, limit }) => {
            assert_eq!(size, bytes.len());
            assert_eq!(limit, 16);
        }
        other => panic!("Expected PayloadTooLarge, got {:?}", other),
    }
}

#[test]
fn test_err_recursion_limit() {
    let mut nested = json!(1);
    for _ in 0..(codec::MAX_DEPTH + 4) {
        nested = json!([nested]);
    }
    let bytes = encode_frame(&Frame::notify("X", "$m", vec![nested])).unwrap();
    match decode_frame(&bytes, DEFAULT_MAX_FRAME_BYTES) {
        Err(RpcError::RecursionLimitExceeded) => {}
        other => panic!("Expected RecursionLimitExceeded, got {:?}", other),
    }
}

#[test]
fn test_peek_request_id_on_malformed_request() {
    // `args` must be an array, so the frame is invalid, but the call id is recoverable.
    let bytes = br#"{"kind":"request","callId":42,"proxyId":"X","method":"$m","args":5}"#;
    assert!(decode_frame(bytes, DEFAULT_MAX_FRAME_BYTES).is_err());
    assert_eq!(peek_request_id(bytes), Some(42));

    assert_eq!(peek_request_id(br#"{"kind":"notify","proxyId":"X"}"#), None);
    assert_eq!(peek_request_id(b"nope"), None);
}

// ============================================================================
//  ARGUMENTS
// ============================================================================

#[test]
fn test_args_missing_trailing_argument_is_null() {
    let mut decoder = ArgsDecoder::new("$m", vec![json!(1)]);
    let first: u32 = decoder.read().unwrap();
    let second: Option<String> = decoder.read().unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, None);
}

#[test]
fn test_args_bad_argument_reports_index() {
    let mut decoder = ArgsDecoder::new("$m", vec![json!(1), json!("two")]);
    let _: u32 = decoder.read().unwrap();
    let err = decoder.read::<u32>().unwrap_err();
    match &err {
        RpcError::BadArgument { method, index, .. } => {
            assert_eq!(method, "$m");
            assert_eq!(*index, 1);
        }
        _ => panic!("Expected BadArgument, got {:?}", err),
    }
    match FailureReason::from(err) {
        FailureReason::BadArguments(_) => {}
        other => panic!("Expected BadArguments, got {:?}", other),
    }
}

#[test]
fn test_args_encoder_collects_in_order() {
    let args = ArgsEncoder::new().push(&1u8).push("two").push(&vec![3, 4]).finish().unwrap();
    assert_eq!(args, vec![json!(1), json!("two"), json!([3, 4])]);
}

// ============================================================================
//  GENERATED INTERFACES
// ============================================================================

crate::rpc_interface! {
    /// Test interface.
    pub trait Calculator: proxy CalculatorProxy, dispatch CalculatorDispatch {
        requests {
            fn add(&self, a: i64, b: i64) -> i64;
            fn add_all(&self, values: Vec<i64>) -> i64;
            fn divide(&self, a: i64, b: i64) -> i64;
            fn greet(&self, name: Option<String>) -> String;
        }
        notifications {
            fn record(&self, entry: String);
        }
    }
}

#[derive(Default)]
struct RealCalculator {
    log: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Calculator for RealCalculator {
    async fn add(&self, a: i64, b: i64) -> CallResult<i64> {
        Ok(a + b)
    }

    async fn add_all(&self, values: Vec<i64>) -> CallResult<i64> {
        Ok(values.iter().sum())
    }

    async fn divide(&self, a: i64, b: i64) -> CallResult<i64> {
        if b == 0 {
            return Err(FailureReason::failed("division by zero"));
        }
        Ok(a / b)
    }

    async fn greet(&self, name: Option<String>) -> CallResult<String> {
        Ok(format!("hello {}", name.unwrap_or_else(|| "stranger".into())))
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

/// Routes proxy calls straight into a handler, through JSON bytes.
struct Loopback {
    handler: Arc<dyn Handler>,
    notify_errors: Mutex<Vec<FailureReason>>,
    methods: Mutex<Vec<String>>,
}

impl Loopback {
    fn through_wire(args: Vec<Value>) -> Vec<Value> {
        let bytes = serde_json::to_vec(&args).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[async_trait::async_trait]
impl Remote for Loopback {
    async fn call(&self, _proxy_id: &str, method: &str, args: Vec<Value>) -> CallResult<Value> {
        self.methods.lock().unwrap().push(method.to_string());
        self.handler.call(method, Self::through_wire(args)).await
    }

    fn notify(&self, _proxy_id: &str, method: &str, args: Vec<Value>) {
        self.methods.lock().unwrap().push(method.to_string());
        if let Err(e) = self.handler.notify(method, Self::through_wire(args)) {
            self.notify_errors.lock().unwrap().push(e);
        }
    }
}

const CALCULATOR: ProxyIdentifier<dyn Calculator> = ProxyIdentifier::new("Calculator");

fn loopback() -> (Arc<RealCalculator>, Arc<Loopback>, Arc<dyn Calculator>) {
    let real = Arc::new(RealCalculator::default());
    let instance: Arc<dyn Calculator> = real.clone();
    let handler = <dyn Calculator as Interface>::handler(instance, CALCULATOR.id());
    let remote = Arc::new(Loopback { handler, notify_errors: Mutex::new(Vec::new()), methods: Mutex::new(Vec::new()) });
    let proxy = <dyn Calculator as Interface>::proxy(remote.clone(), CALCULATOR.id());
    (real, remote, proxy)
}

#[tokio::test]
async fn test_proxy_round_trip() {
    let (_, _, proxy) = loopback();
    assert_eq!(proxy.add(2, 3).await.unwrap(), 5);
    assert_eq!(proxy.greet(Some("ada".into())).await.unwrap(), "hello ada");
    assert_eq!(proxy.greet(None).await.unwrap(), "hello stranger");
}

#[tokio::test]
async fn test_wire_method_names() {
    let (_, remote, proxy) = loopback();
    assert_eq!(proxy.add_all(vec![1, 2, 3]).await.unwrap(), 6);
    proxy.record("entry".into());
    assert_eq!(*remote.methods.lock().unwrap(), vec!["$add_all".to_string(), "$record".to_string()]);
}

#[tokio::test]
async fn test_proxy_propagates_handler_error() {
    let (_, _, proxy) = loopback();
    match proxy.divide(1, 0).await {
        Err(FailureReason::Failed(msg)) => assert_eq!(msg, "division by zero"),
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_notification_reaches_handler() {
    let (real, remote, proxy) = loopback();
    proxy.record("one".into());
    proxy.record("two".into());
    assert_eq!(*real.log.lock().unwrap(), vec!["one".to_string(), "two".to_string()]);
    assert!(remote.notify_errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dispatch_unknown_method() {
    let (_, remote, _) = loopback();
    match remote.handler.call("$multiply", vec![json!(1), json!(2)]).await {
        Err(FailureReason::MethodNotFound { proxy, method }) => {
            assert_eq!(proxy, "Calculator");
            assert_eq!(method, "$multiply");
        }
        other => panic!("Expected MethodNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatch_bad_arguments() {
    let (_, remote, _) = loopback();
    match remote.handler.call("$add", vec![json!("one"), json!(2)]).await {
        Err(FailureReason::BadArguments(_)) => {}
        other => panic!("Expected BadArguments, got {:?}", other),
    }
}

#[test]
fn test_identifier_display_and_eq() {
    const OTHER: ProxyIdentifier<dyn Calculator> = ProxyIdentifier::new("Calculator");
    assert_eq!(CALCULATOR, OTHER);
    assert_eq!(CALCULATOR.to_string(), "Calculator");
    assert_eq!(format!("{:?}", CALCULATOR), "ProxyIdentifier(Calculator)");
}
