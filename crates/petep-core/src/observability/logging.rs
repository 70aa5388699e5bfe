use std::{borrow::Cow, error::Error};

/// 日志级别枚举，参考 `tracing` crate 的级别集合并保留 `Fatal`。
///
/// # 契约说明（What）
/// - `Info` 表示常规事件，`Warn` 表示潜在风险，`Error` 表示故障，`Fatal` 代表不可恢复错误；
/// - 导出器可依据级别映射到目标系统，`Fatal` 在 `tracing` 中映射为 `ERROR`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// 结构化日志字段。
///
/// # 风险提示（Trade-offs）
/// - 字段值以 `Cow` 持有，静态文本零拷贝；动态值（如 PDU 长度）需调用方先行格式化。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue<'a> {
    pub key: &'a str,
    pub value: Cow<'a, str>,
}

impl<'a> KeyValue<'a> {
    /// 构造字段。
    pub fn new(key: &'a str, value: impl Into<Cow<'a, str>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// 结构化日志字段集合。
pub type LogField<'a> = &'a [KeyValue<'a>];

/// 单条结构化日志记录。
///
/// # 设计背景（Why）
/// - 将消息、级别、目标、字段与可选错误打包成单一结构，拦截器与链路共用同一出口。
///
/// # 契约说明（What）
/// - **前置条件**：`attributes` 必须在 [`Logger::log`] 返回前保持有效；
/// - **后置条件**：记录提交后应视为不可变对象，实现方若需延迟输出必须自行复制。
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub message: Cow<'a, str>,
    pub severity: LogSeverity,
    pub target: Option<Cow<'a, str>>,
    pub error: Option<&'a dyn Error>,
    pub attributes: LogField<'a>,
}

impl<'a> LogRecord<'a> {
    /// 构建新的日志记录，仅包含引用，不进行任何复制。
    pub fn new(
        message: impl Into<Cow<'a, str>>,
        severity: LogSeverity,
        target: Option<impl Into<Cow<'a, str>>>,
        error: Option<&'a dyn Error>,
        attributes: LogField<'a>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            target: target.map(Into::into),
            error,
            attributes,
        }
    }
}

/// 日志接口的核心契约。
///
/// # 设计背景（Why）
/// - 拦截器通过 [`Helper`](crate::Helper) 获得日志能力，而不直接依赖宿主的日志实现；
///   宿主可对接 `tracing`、文件或 GUI 日志面板。
///
/// # 逻辑解析（How）
/// - `log` 为唯一必需方法；`info`/`warn`/`error` 等便捷方法内部构造 [`LogRecord`] 再调用 `log`。
///
/// # 契约说明（What）
/// - 实现必须 `Send + Sync`：同一日志器会被多个工作线程上的链路遍历并发调用；
/// - 实现应尽量非阻塞，链路调度在调用线程上同步执行。
pub trait Logger: Send + Sync + 'static {
    /// 提交结构化日志。
    fn log(&self, record: &LogRecord<'_>);

    /// 输出 TRACE 日志。
    fn trace(&self, message: &str) {
        self.log_with_fields(LogSeverity::Trace, message, &[]);
    }

    /// 输出 DEBUG 日志。
    fn debug(&self, message: &str) {
        self.log_with_fields(LogSeverity::Debug, message, &[]);
    }

    /// 输出 INFO 日志。
    fn info(&self, message: &str) {
        self.log_with_fields(LogSeverity::Info, message, &[]);
    }

    /// 输出 WARN 日志。
    fn warn(&self, message: &str) {
        self.log_with_fields(LogSeverity::Warn, message, &[]);
    }

    /// 输出 ERROR 日志，可附带错误对象。
    fn error(&self, message: &str, error: Option<&dyn Error>) {
        let record = LogRecord::new(
            message,
            LogSeverity::Error,
            None::<Cow<'_, str>>,
            error,
            &[],
        );
        self.log(&record);
    }

    /// 以指定级别输出带字段的日志。
    fn log_with_fields(&self, severity: LogSeverity, message: &str, attributes: LogField<'_>) {
        let record = LogRecord::new(message, severity, None::<Cow<'_, str>>, None, attributes);
        self.log(&record);
    }
}

/// 丢弃所有记录的日志器，供不关心日志的宿主使用。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: &LogRecord<'_>) {}
}

/// 将日志契约桥接到 `tracing` 生态。
///
/// # 教案式说明
/// - **意图（Why）**：多数宿主已经安装 `tracing` 订阅器，桥接后拦截器日志无需额外配置即可进入
///   同一输出通道；
/// - **逻辑（How）**：按级别选择 `tracing` 宏；`tracing` 的 target 必须是编译期常量，因此记录中的
///   `target` 与结构化字段以事件字段形式附带；
/// - **契约（What）**：`Fatal` 映射为 `ERROR`；未安装订阅器时事件被静默丢弃。
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl TracingLogger {
    fn render_fields(attributes: LogField<'_>) -> String {
        attributes
            .iter()
            .map(|field| format!("{}={}", field.key, field.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let target = record.target.as_deref().unwrap_or("petep");
        let fields = Self::render_fields(record.attributes);
        let message = record.message.as_ref();
        match (record.severity, record.error) {
            (LogSeverity::Trace, _) => {
                tracing::trace!(log.target = target, fields = %fields, "{message}")
            }
            (LogSeverity::Debug, _) => {
                tracing::debug!(log.target = target, fields = %fields, "{message}")
            }
            (LogSeverity::Info, _) => {
                tracing::info!(log.target = target, fields = %fields, "{message}")
            }
            (LogSeverity::Warn, _) => {
                tracing::warn!(log.target = target, fields = %fields, "{message}")
            }
            (LogSeverity::Error | LogSeverity::Fatal, Some(error)) => {
                tracing::error!(log.target = target, fields = %fields, error = %error, "{message}")
            }
            (LogSeverity::Error | LogSeverity::Fatal, None) => {
                tracing::error!(log.target = target, fields = %fields, "{message}")
            }
        }
    }
}
