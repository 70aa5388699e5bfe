use std::sync::{Arc, Mutex};

use petep_core::{
    ChainDirection, Destination, InterceptorRegistry, NoopLogger, PassOutcome, Pattern,
    interceptor_fn,
};

use super::{Recording, pdu};

/// 丢弃会短路后续拦截器，且最近处理者停留在丢弃者。
#[test]
fn drop_short_circuits_remaining_interceptors() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let registry = InterceptorRegistry::new();
    for (code, proceed) in [("a", false), ("b", true), ("c", true)] {
        registry
            .register(ChainDirection::ClientToServer, Recording::new(code, proceed, &events))
            .expect("register");
    }
    let pipeline = registry.activate(Arc::new(NoopLogger)).expect("activate");

    let mut message = pdu(Destination::Server, b"hello");
    let outcome = pipeline.process(&mut message).expect("pass");

    match outcome {
        PassOutcome::Dropped { by } => {
            assert_eq!(by.code(), "a");
            assert_eq!(by.position(), 0);
        }
        other => panic!("期望被 A 丢弃，实际为 {other:?}"),
    }
    assert_eq!(
        events.lock().unwrap().as_slice(),
        ["a<-"],
        "B 与 C 不应被调用"
    );
    assert_eq!(message.last_interceptor().map(|last| last.code()), Some("a"));
}

/// 全部继续时按注册顺序执行，并且每个拦截器都能看到前一个处理者。
#[test]
fn continue_runs_in_registration_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let registry = InterceptorRegistry::new();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("a", true, &events))
        .unwrap();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("b", true, &events))
        .unwrap();
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    let mut message = pdu(Destination::Server, b"hello");
    let outcome = pipeline.process(&mut message).unwrap();

    assert_eq!(outcome, PassOutcome::Forwarded);
    assert_eq!(events.lock().unwrap().as_slice(), ["a<-", "b<a"]);
    let last = message.last_interceptor().expect("last interceptor");
    assert_eq!((last.code(), last.name(), last.position()), ("b", "B", 1));
}

/// 目的地决定链路方向：发往客户端的 PDU 不经过客户端到服务端链路。
#[test]
fn destination_selects_chain() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let registry = InterceptorRegistry::new();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("up", true, &events))
        .unwrap();
    registry
        .register(ChainDirection::ServerToClient, Recording::new("down", true, &events))
        .unwrap();
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    let mut response = pdu(Destination::Client, b"response");
    pipeline.process(&mut response).unwrap();
    let mut request = pdu(Destination::Server, b"request");
    pipeline.process(&mut request).unwrap();

    assert_eq!(events.lock().unwrap().as_slice(), ["down<-", "up<-"]);
}

/// 空链路直接转发，PDU 保持原样。
#[test]
fn empty_chain_forwards_untouched() {
    let pipeline = InterceptorRegistry::new()
        .activate(Arc::new(NoopLogger))
        .unwrap();
    let mut message = pdu(Destination::Client, b"as-is");

    assert!(pipeline.process(&mut message).unwrap().is_forwarded());
    assert_eq!(message.buffer(), b"as-is");
    assert!(message.last_interceptor().is_none());
}

/// 从指定位置恢复遍历时跳过之前的拦截器。
#[test]
fn resume_from_position_skips_earlier_interceptors() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let registry = InterceptorRegistry::new();
    for code in ["a", "b", "c"] {
        registry
            .register(ChainDirection::ServerToClient, Recording::new(code, true, &events))
            .unwrap();
    }
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    let mut message = pdu(Destination::Client, b"resume");
    pipeline.process_from(&mut message, 1).unwrap();
    assert_eq!(events.lock().unwrap().as_slice(), ["b<-", "c<b"]);

    events.lock().unwrap().clear();
    let mut beyond = pdu(Destination::Client, b"beyond");
    let outcome = pipeline.process_from(&mut beyond, 9).unwrap();
    assert_eq!(outcome, PassOutcome::Forwarded);
    assert!(events.lock().unwrap().is_empty());
}

/// 前一个拦截器的修改对后一个完全可见。
#[test]
fn later_interceptors_observe_earlier_rewrites() {
    let registry = InterceptorRegistry::new();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("rewrite", "Rewrite", |pdu, helper| {
                helper.replace(pdu, b"world", b"there")?;
                Ok(true)
            }),
        )
        .unwrap();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("check", "Check", |pdu, _| {
                let pattern = Pattern::from_text("there").expect("pattern");
                Ok(petep_core::bytes::contains(pdu.buffer(), pattern.as_bytes()))
            }),
        )
        .unwrap();
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    let mut message = pdu(Destination::Server, b"Hello world");
    assert!(pipeline.process(&mut message).unwrap().is_forwarded());
    assert_eq!(message.buffer(), b"Hello there");
    assert_eq!(message.size(), 11);
}
