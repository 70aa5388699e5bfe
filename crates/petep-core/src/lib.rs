#![deny(unsafe_code)]
#![doc = "petep-core: 代理流量中 PDU 拦截链路与字节重写引擎的核心契约。"]
#![doc = ""]
#![doc = "== 数据流 =="]
#![doc = "传输层将 PDU 交给对应方向的 [`InterceptorChain`]；链路按注册顺序依次调用拦截器，"]
#![doc = "任一拦截器返回 `false` 即丢弃，全部返回 `true` 则交还传输层转发。"]
#![doc = ""]
#![doc = "== 生命周期 =="]
#![doc = "[`InterceptorRegistry`] 负责收集注册；`activate` 之后链路冻结为只读的 [`InterceptorPipeline`]，"]
#![doc = "之后的注册一律返回 [`PipelineError::RegistrationClosed`]。"]

/// 字节序列工具：查找、前后缀判断、十六进制渲染与文本编码。
pub mod bytes;
pub mod chain;
pub mod error;
pub mod helper;
pub mod interceptor;
pub mod observability;
pub mod pdu;
pub mod pipeline;
pub mod registry;
pub mod rewrite;
/// 测试桩命名空间，集中暴露官方维护的记录型日志器等桩对象，供集成测试与下游 crate 复用。
pub mod test_stubs;

pub use chain::{InterceptorChain, PassOutcome, PassState};
pub use error::{CoreError, PipelineError, Result, codes};
pub use helper::Helper;
pub use interceptor::{FnInterceptor, Interceptor, InterceptorDescriptor, interceptor_fn};
pub use observability::{KeyValue, LogRecord, LogSeverity, Logger, NoopLogger};
#[cfg(feature = "tracing")]
pub use observability::TracingLogger;
pub use pdu::{ConnectionRef, Destination, InterceptorRef, Pdu, ProxyRef};
pub use pipeline::InterceptorPipeline;
pub use registry::{ChainDirection, InterceptorHandle, InterceptorRegistration, InterceptorRegistry};
pub use rewrite::{Pattern, Rewrite, RewriteReport, RewriteRule, RewriteSet};
