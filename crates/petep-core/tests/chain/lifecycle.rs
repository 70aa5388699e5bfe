use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use petep_core::{
    ChainDirection, CoreError, Destination, Helper, Interceptor, InterceptorDescriptor,
    InterceptorRegistry, LogSeverity, NoopLogger, Pdu, PipelineError, codes, interceptor_fn,
    test_stubs::RecordingLogger,
};

use super::pdu;

/// 生命周期计数，由测试与拦截器共享。
#[derive(Default)]
struct Lifecycle {
    fail_prepare: AtomicBool,
    prepared: AtomicUsize,
    stopped: AtomicUsize,
}

/// 可配置 `prepare` 结果并统计生命周期调用的拦截器。
struct Probe(Arc<Lifecycle>);

impl Interceptor for Probe {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new("lifecycle", "Lifecycle")
    }

    fn prepare(&self) -> Result<(), CoreError> {
        self.0.prepared.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_prepare.load(Ordering::SeqCst) {
            return Err(CoreError::new("app.lifecycle", "history store unavailable"));
        }
        Ok(())
    }

    fn intercept(&self, _pdu: &mut Pdu, _helper: &Helper) -> Result<bool, CoreError> {
        Ok(true)
    }

    fn stop(&self) {
        self.0.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// 激活后注册失败，且已有链路内容不变。
#[test]
fn registration_after_activation_is_rejected() {
    let registry = InterceptorRegistry::new();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("first", "First", |_, _| Ok(true)),
        )
        .unwrap();
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    let err = registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("late", "Late", |_, _| Ok(false)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::RegistrationClosed {
            direction: ChainDirection::ClientToServer
        }
    ));
    assert_eq!(err.code(), codes::REGISTRY_CLOSED);

    let registered: Vec<_> = registry
        .snapshot(ChainDirection::ClientToServer)
        .iter()
        .map(|entry| entry.code().to_owned())
        .collect();
    assert_eq!(registered, ["first"]);
    assert_eq!(pipeline.chain(ChainDirection::ClientToServer).len(), 1);

    let mut message = pdu(Destination::Server, b"still flows");
    assert!(pipeline.process(&mut message).unwrap().is_forwarded());
}

/// `prepare` 失败时激活放弃，注册表保持开放，修正后可再次激活。
#[test]
fn failed_prepare_keeps_registry_open() {
    let lifecycle = Arc::new(Lifecycle::default());
    lifecycle.fail_prepare.store(true, Ordering::SeqCst);

    let registry = InterceptorRegistry::new();
    registry
        .register(ChainDirection::ServerToClient, Probe(Arc::clone(&lifecycle)))
        .unwrap();

    let err = registry.activate(Arc::new(NoopLogger)).unwrap_err();
    match &err {
        PipelineError::PrepareFailed { code, source } => {
            assert_eq!(code, "lifecycle");
            assert_eq!(source.code(), "app.lifecycle");
        }
        other => panic!("期望 PrepareFailed，实际为 {other:?}"),
    }
    assert!(!registry.is_closed());

    registry
        .register(
            ChainDirection::ServerToClient,
            interceptor_fn("after-retry", "After retry", |_, _| Ok(true)),
        )
        .expect("注册表仍应开放");

    lifecycle.fail_prepare.store(false, Ordering::SeqCst);
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();
    assert_eq!(lifecycle.prepared.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.chain(ChainDirection::ServerToClient).len(), 2);
}

/// 同一实例挂到两个方向时，`prepare` 与 `stop` 按注册项各调用一次。
#[test]
fn stop_reaches_every_registration() {
    let lifecycle = Arc::new(Lifecycle::default());
    let logger = Arc::new(RecordingLogger::default());
    let probe: Arc<dyn Interceptor> = Arc::new(Probe(Arc::clone(&lifecycle)));
    let registry = InterceptorRegistry::new();
    registry
        .register_shared(ChainDirection::ClientToServer, Arc::clone(&probe))
        .unwrap();
    registry
        .register_shared(ChainDirection::ServerToClient, probe)
        .unwrap();

    let pipeline = registry.activate(logger.clone()).unwrap();
    assert_eq!(lifecycle.prepared.load(Ordering::SeqCst), 2);

    pipeline.stop();
    assert_eq!(lifecycle.stopped.load(Ordering::SeqCst), 2);
    assert_eq!(
        logger.messages_at(LogSeverity::Info),
        ["interceptor chains activated", "interceptor chains stopped"]
    );
}

/// 激活日志携带两条链路的长度。
#[test]
fn activation_reports_chain_sizes() {
    let logger = Arc::new(RecordingLogger::default());
    let registry = InterceptorRegistry::new();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("only", "Only", |_, _| Ok(true)),
        )
        .unwrap();
    registry.activate(logger.clone()).unwrap();

    let records = logger.records();
    let activated = records
        .iter()
        .find(|record| record.message == "interceptor chains activated")
        .expect("activation record");
    assert!(
        activated
            .attributes
            .contains(&("petep.chain.client_to_server".to_owned(), "1".to_owned()))
    );
    assert!(
        activated
            .attributes
            .contains(&("petep.chain.server_to_client".to_owned(), "0".to_owned()))
    );
}
