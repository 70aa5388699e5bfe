//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为拦截链路对外暴露的错误语义提供集中定义：模式非法、注册已关闭、拦截器失败等；
//! - 区分“拦截器实现返回的错误”（[`CoreError`]）与“核心操作返回的错误”（[`PipelineError`]），
//!   前者由脚本/模块作者构造，后者由链路在边界处包装并携带拦截器身份。
//!
//! ## 设计要求（What）
//! - 所有错误码遵循 `<领域>.<语义>` 命名，集中登记于 [`codes`]；
//! - [`PipelineError`] 派生 [`thiserror::Error`]，可直接与 `std::error::Error` 生态互通；
//! - 缓冲区长度与 `size` 不一致属于构造期即被排除的状态，不存在对应错误变体。

use std::{any::Any, borrow::Cow, error::Error, fmt};

use crate::registry::ChainDirection;

/// 核心操作统一返回类型。
pub type Result<T, E = PipelineError> = core::result::Result<T, E>;

/// 拦截器错误链中的底层原因。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// `CoreError` 是拦截器实现向链路报告失败时使用的错误载体。
///
/// # 设计背景（Why）
/// - 拦截器来自脚本或第三方模块，错误形态千差万别；链路只需要稳定的错误码、可读消息与可选根因。
/// - 链路在捕获后会将其包装为 [`PipelineError::InterceptorFailure`]，并补充拦截器身份。
///
/// # 契约说明（What）
/// - `code`：稳定字符串，建议使用 [`codes`] 中的常量或遵循 `namespace.reason` 约定；
/// - `message`：面向排障人员的描述，避免包含 PDU 原始负载等敏感数据；
/// - `cause`：可选底层原因，通过 [`Error::source`] 暴露。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl CoreError {
    /// 构造核心错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 将拦截器 panic 的负载转换为核心错误。
    ///
    /// # 执行逻辑（How）
    /// - `panic!` 的负载通常是 `&'static str` 或 `String`，两者都提取为消息；
    /// - 其他类型的负载无法安全格式化，退化为固定描述。
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(text) => Cow::Owned(format!("interceptor panicked: {text}")),
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(text) => Cow::Owned(format!("interceptor panicked: {text}")),
                Err(_) => Cow::Borrowed("interceptor panicked with a non-string payload"),
            },
        };
        Self::new(codes::INTERCEPTOR_PANICKED, message)
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn Error + 'static))
    }
}

/// 拦截链路核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合重写引擎、注册表与链路调度三处边界的失败，调用方只需匹配一个枚举即可
///   决定后续处置（拒绝配置、放弃本次 PDU、或继续处理后续 PDU）。
/// - **契约 (What)**：
///   - 所有变体均为 `Send + Sync + 'static`，可跨工作线程传播；
///   - [`PipelineError::code`] 将每个变体映射到 [`codes`] 中的稳定错误码；
///   - `InterceptorFailure` 仅终止当前 PDU 的这一次遍历，链路本身保持可用。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 重写请求携带空模式。
    ///
    /// - **契约 (What)**：在任何缓冲区修改之前拒绝，PDU 保持原样。
    #[error("rewrite pattern must not be empty")]
    InvalidPattern,

    /// 链路已激活，拒绝新的注册。
    ///
    /// - **契约 (What)**：`direction` 为请求注册的链路方向；已存在的链路内容不受影响。
    #[error("interceptor registration for {direction} chain is closed")]
    RegistrationClosed { direction: ChainDirection },

    /// 注册表已被激活过一次。
    ///
    /// - **契约 (What)**：第二次激活不会重复调用 `prepare`，首次激活得到的管线保持可用。
    #[error("interceptor registry is already activated")]
    AlreadyActivated,

    /// 拦截器在 `intercept` 中返回错误或发生 panic。
    ///
    /// - **契约 (What)**：`code`/`name`/`position` 标识失败的拦截器；`source` 为原始错误。
    /// - **风险 (Trade-offs)**：PDU 可能已被前序拦截器部分修改，传输层必须将其视为处理失败，
    ///   不能静默转发。
    #[error("interceptor `{name}` ({code}) at position {position} failed: {source}")]
    InterceptorFailure {
        code: String,
        name: String,
        position: usize,
        #[source]
        source: CoreError,
    },

    /// 激活阶段拦截器 `prepare` 失败，激活被整体放弃。
    #[error("interceptor `{code}` failed to prepare: {source}")]
    PrepareFailed {
        code: String,
        #[source]
        source: CoreError,
    },

    /// 显式长度超出了给定字节数。
    #[error("requested buffer size {requested} exceeds {available} supplied bytes")]
    InvalidSize { requested: usize, available: usize },

    /// 十六进制文本无法解析。
    #[error("invalid hex string: {detail}")]
    InvalidHex { detail: String },

    /// 配置值未通过构造期校验。
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },
}

impl PipelineError {
    /// 返回该错误对应的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidPattern => codes::PATTERN_INVALID,
            PipelineError::RegistrationClosed { .. } => codes::REGISTRY_CLOSED,
            PipelineError::AlreadyActivated => codes::REGISTRY_ALREADY_ACTIVATED,
            PipelineError::InterceptorFailure { .. } => codes::INTERCEPTOR_FAILURE,
            PipelineError::PrepareFailed { .. } => codes::INTERCEPTOR_PREPARE_FAILED,
            PipelineError::InvalidSize { .. } => codes::PDU_INVALID_SIZE,
            PipelineError::InvalidHex { .. } => codes::BYTES_INVALID_HEX,
            PipelineError::InvalidConfig { .. } => codes::CONFIG_INVALID,
        }
    }

    /// 构造配置错误的便捷函数。
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            detail: detail.into(),
        }
    }
}

/// 拦截器内部调用核心操作失败时，以 `?` 直接转换为 [`CoreError`]，错误码沿用原变体。
impl From<PipelineError> for CoreError {
    fn from(error: PipelineError) -> Self {
        CoreError::new(error.code(), error.to_string()).with_cause(error)
    }
}

/// 链路内置的错误码常量集合，确保日志与告警具有稳定识别符。
pub mod codes {
    /// 重写模式为空或不合法。
    pub const PATTERN_INVALID: &str = "pattern.invalid";
    /// 注册表已激活，不再接受注册。
    pub const REGISTRY_CLOSED: &str = "registry.closed";
    /// 注册表重复激活。
    pub const REGISTRY_ALREADY_ACTIVATED: &str = "registry.already_activated";
    /// 拦截器在处理 PDU 时失败。
    pub const INTERCEPTOR_FAILURE: &str = "interceptor.failure";
    /// 拦截器在处理 PDU 时 panic。
    pub const INTERCEPTOR_PANICKED: &str = "interceptor.panicked";
    /// 拦截器激活准备失败。
    pub const INTERCEPTOR_PREPARE_FAILED: &str = "interceptor.prepare_failed";
    /// 显式指定的 PDU 长度非法。
    pub const PDU_INVALID_SIZE: &str = "pdu.invalid_size";
    /// 十六进制文本非法。
    pub const BYTES_INVALID_HEX: &str = "bytes.invalid_hex";
    /// 配置校验失败。
    pub const CONFIG_INVALID: &str = "config.invalid";
}
