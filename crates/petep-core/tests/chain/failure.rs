use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use petep_core::{
    ChainDirection, CoreError, Destination, InterceptorRegistry, LogSeverity, PipelineError,
    codes, interceptor_fn, test_stubs::RecordingLogger,
};

use super::{Recording, pdu};

/// 拦截器返回错误时遍历终止，后续拦截器不会被调用。
#[test]
fn interceptor_error_aborts_pass_with_identity() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let logger = Arc::new(RecordingLogger::default());
    let registry = InterceptorRegistry::new();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("a", true, &events))
        .unwrap();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("broken", "Broken", |_, _| {
                Err(CoreError::new("app.broken", "refused"))
            }),
        )
        .unwrap();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("c", true, &events))
        .unwrap();
    let pipeline = registry.activate(logger.clone()).unwrap();

    let mut message = pdu(Destination::Server, b"payload");
    let err = pipeline.process(&mut message).unwrap_err();

    match &err {
        PipelineError::InterceptorFailure {
            code,
            name,
            position,
            source,
        } => {
            assert_eq!((code.as_str(), name.as_str(), *position), ("broken", "Broken", 1));
            assert_eq!(source.code(), "app.broken");
        }
        other => panic!("期望 InterceptorFailure，实际为 {other:?}"),
    }
    assert_eq!(err.code(), codes::INTERCEPTOR_FAILURE);
    assert_eq!(events.lock().unwrap().as_slice(), ["a<-"], "C 不应被调用");
    assert_eq!(
        message.last_interceptor().map(|last| last.code()),
        Some("a"),
        "失败的拦截器不会成为最近处理者"
    );
    assert_eq!(
        logger.messages_at(LogSeverity::Error),
        ["interceptor failed, PDU pass aborted"]
    );
}

/// panic 被捕获并转换为失败，链路继续服务下一条 PDU。
#[test]
fn panic_is_contained_and_chain_stays_usable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry = InterceptorRegistry::new();
    registry
        .register(
            ChainDirection::ServerToClient,
            interceptor_fn("fragile", "Fragile", move |pdu, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                if pdu.buffer() == b"poison" {
                    panic!("poisoned payload");
                }
                Ok(true)
            }),
        )
        .unwrap();
    let pipeline = registry.activate(Arc::new(RecordingLogger::default())).unwrap();

    let mut poison = pdu(Destination::Client, b"poison");
    let err = pipeline.process(&mut poison).unwrap_err();
    match err {
        PipelineError::InterceptorFailure { source, .. } => {
            assert_eq!(source.code(), codes::INTERCEPTOR_PANICKED);
            assert!(source.message().contains("poisoned payload"));
        }
        other => panic!("期望 InterceptorFailure，实际为 {other:?}"),
    }

    let mut healthy = pdu(Destination::Client, b"healthy");
    assert!(pipeline.process(&mut healthy).unwrap().is_forwarded());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// 拦截器内部以 `?` 传播核心错误时保留原错误码。
#[test]
fn core_errors_propagate_through_question_mark() {
    let registry = InterceptorRegistry::new();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("empty-pattern", "Empty pattern", |pdu, helper| {
                helper.replace(pdu, b"", b"x")?;
                Ok(true)
            }),
        )
        .unwrap();
    let pipeline = registry.activate(Arc::new(RecordingLogger::default())).unwrap();

    let mut message = pdu(Destination::Server, b"unchanged");
    let err = pipeline.process(&mut message).unwrap_err();
    match err {
        PipelineError::InterceptorFailure { source, .. } => {
            assert_eq!(source.code(), codes::PATTERN_INVALID);
        }
        other => panic!("期望 InterceptorFailure，实际为 {other:?}"),
    }
    assert_eq!(message.buffer(), b"unchanged");
}

/// 从中途位置恢复的遍历失败时，错误报告失败拦截器在整条链路中的位置，且不记录完成日志。
#[test]
fn resumed_pass_reports_absolute_failure_position() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let logger = Arc::new(RecordingLogger::default());
    let registry = InterceptorRegistry::new();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("a", true, &events))
        .unwrap();
    registry
        .register(ChainDirection::ClientToServer, Recording::new("b", true, &events))
        .unwrap();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("late-broken", "Late broken", |_, _| {
                Err(CoreError::new("app.late", "refused late"))
            }),
        )
        .unwrap();
    let pipeline = registry.activate(logger.clone()).unwrap();
    logger.clear();

    let mut message = pdu(Destination::Server, b"payload");
    let err = pipeline.process_from(&mut message, 1).unwrap_err();

    match err {
        PipelineError::InterceptorFailure { code, position, .. } => {
            assert_eq!((code.as_str(), position), ("late-broken", 2));
        }
        other => panic!("期望 InterceptorFailure，实际为 {other:?}"),
    }
    assert_eq!(events.lock().unwrap().as_slice(), ["b<-"], "A 位于恢复点之前");
    assert_eq!(
        message.last_interceptor().map(|last| last.code()),
        Some("b")
    );
    assert!(
        !logger
            .messages_at(LogSeverity::Debug)
            .iter()
            .any(|message| message == "PDU pass finished"),
        "失败的遍历不输出完成日志"
    );
}
