use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use petep_core::{ChainDirection, Destination, InterceptorRegistry, NoopLogger, interceptor_fn};

use super::pdu;

/// 两个连接并发经过同一链路：共享计数不丢失更新，PDU 之间互不可见。
#[test]
fn concurrent_passes_share_only_interceptor_state() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let registry = InterceptorRegistry::new();
    registry
        .register(
            ChainDirection::ClientToServer,
            interceptor_fn("count", "Count", move |pdu, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                let tag = format!("seen-by-{}", pdu.connection().code());
                pdu.add_tag(tag);
                Ok(true)
            }),
        )
        .unwrap();
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ["conn-a", "conn-b"]
            .into_iter()
            .map(|connection| {
                let pipeline = pipeline.clone();
                scope.spawn(move || {
                    let mut message = petep_core::Pdu::new(
                        petep_core::ProxyRef::new("petep.tcp", "TCP proxy"),
                        petep_core::ConnectionRef::new(connection),
                        Destination::Server,
                        connection.as_bytes().to_vec(),
                    );
                    let outcome = pipeline.process(&mut message).expect("pass");
                    (outcome, message)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread"))
            .collect()
    });

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    for (outcome, message) in results {
        assert!(outcome.is_forwarded());
        let tags: Vec<_> = message.tags().collect();
        assert_eq!(tags.len(), 1, "每条 PDU 只应带自己的标签");
        assert_eq!(tags[0], format!("seen-by-{}", message.connection().code()));
        assert_eq!(message.buffer(), message.connection().code().as_bytes());
    }
}

/// 大量 PDU 交错经过两个方向，计数与调用次数一致。
#[test]
fn many_passes_across_both_directions() {
    const PER_THREAD: usize = 200;
    let seen = Arc::new(AtomicUsize::new(0));
    let shared = Arc::clone(&seen);
    let counting: Arc<dyn petep_core::Interceptor> =
        Arc::new(interceptor_fn("count", "Count", move |_, _| {
            shared.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        }));

    let registry = InterceptorRegistry::new();
    registry
        .register_shared(ChainDirection::ClientToServer, Arc::clone(&counting))
        .unwrap();
    registry
        .register_shared(ChainDirection::ServerToClient, counting)
        .unwrap();
    let pipeline = registry.activate(Arc::new(NoopLogger)).unwrap();

    thread::scope(|scope| {
        for destination in [Destination::Server, Destination::Client] {
            for _ in 0..2 {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    for _ in 0..PER_THREAD {
                        let mut message = pdu(destination, b"ping");
                        pipeline.process(&mut message).expect("pass");
                    }
                });
            }
        }
    });

    assert_eq!(seen.load(Ordering::Relaxed), 4 * PER_THREAD);
}
