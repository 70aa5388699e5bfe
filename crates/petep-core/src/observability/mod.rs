//! 可观测性契约：目前仅包含日志。
//!
//! 链路与拦截器只依赖 [`Logger`] trait；具体输出由宿主注入，默认提供 `tracing` 桥接。

pub mod logging;

pub use logging::{KeyValue, LogField, LogRecord, LogSeverity, Logger, NoopLogger};
#[cfg(feature = "tracing")]
pub use logging::TracingLogger;
