//! 拦截链路集成测试。
//!
//! - `ordering`：注册顺序、丢弃短路与 `last_interceptor` 追踪；
//! - `failure`：错误与 panic 终止遍历，链路对后续 PDU 保持可用；
//! - `lifecycle`：激活、注册关闭、`prepare`/`stop` 钩子；
//! - `concurrency`：多线程共享同一管线；
//! - `rewrite_properties`：替换引擎的随机化性质。

mod concurrency;
mod failure;
mod lifecycle;
mod ordering;

use std::sync::{Arc, Mutex};

use petep_core::{
    ConnectionRef, CoreError, Destination, Helper, Interceptor, InterceptorDescriptor, Pdu,
    ProxyRef,
};

pub(crate) fn pdu(destination: Destination, payload: &[u8]) -> Pdu {
    Pdu::new(
        ProxyRef::new("petep.tcp", "TCP proxy"),
        ConnectionRef::new("conn-1"),
        destination,
        payload.to_vec(),
    )
}

/// 记录调用顺序并返回固定结果的拦截器。
pub(crate) struct Recording {
    code: &'static str,
    proceed: bool,
    events: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    pub(crate) fn new(code: &'static str, proceed: bool, events: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            code,
            proceed,
            events: Arc::clone(events),
        }
    }
}

impl Interceptor for Recording {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new(self.code, self.code.to_uppercase())
    }

    fn intercept(&self, pdu: &mut Pdu, _helper: &Helper) -> Result<bool, CoreError> {
        let seen = pdu
            .last_interceptor()
            .map(|last| last.code().to_owned())
            .unwrap_or_else(|| "-".to_owned());
        self.events
            .lock()
            .expect("recording lock")
            .push(format!("{}<{}", self.code, seen));
        Ok(self.proceed)
    }
}
