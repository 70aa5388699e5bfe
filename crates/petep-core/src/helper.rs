use std::sync::Arc;

use crate::{
    bytes,
    error::Result,
    observability::Logger,
    pdu::Pdu,
    rewrite::{Pattern, RewriteReport},
};

/// 传递给每次 `intercept` 调用的能力对象。
///
/// # 教案式说明
/// - **意图（Why）**：拦截器需要日志与若干字节工具，但不应拿到链路或注册表本身；
///   影响链路走向的唯一途径是 `intercept` 的返回值与对 PDU 的修改。
/// - **结构（How）**：只持有共享的 [`Logger`]；其余方法都是无状态的便捷封装，复用
///   [`crate::bytes`] 与 [`crate::rewrite`]。
/// - **契约（What）**：`Helper` 可廉价克隆并在线程间共享；所有方法都不会修改链路状态。
#[derive(Clone)]
pub struct Helper {
    logger: Arc<dyn Logger>,
}

impl Helper {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// 日志出口。
    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// 以 UTF-8 将文本转为字节。
    pub fn bytes_of(&self, text: &str) -> Vec<u8> {
        bytes::bytes_of(text)
    }

    /// 以 UTF-8 文本构造模式。
    pub fn pattern(&self, text: &str) -> Result<Pattern> {
        Pattern::from_text(text)
    }

    /// 十六进制渲染任意字节。
    pub fn to_hex(&self, bytes: &[u8]) -> String {
        bytes::to_hex_string(bytes)
    }

    /// 十六进制渲染 PDU 缓冲区。
    pub fn buffer_hex(&self, pdu: &Pdu) -> String {
        pdu.buffer_hex()
    }

    /// 以原始字节替换 PDU 中的全部出现。
    ///
    /// 空模式在修改缓冲区之前返回 [`PipelineError::InvalidPattern`](crate::PipelineError::InvalidPattern)；
    /// 模式不存在时为无操作。
    pub fn replace(&self, pdu: &mut Pdu, pattern: &[u8], replacement: &[u8]) -> Result<RewriteReport> {
        let pattern = Pattern::new(pattern)?;
        Ok(pdu.replace(&pattern, replacement))
    }
}

impl std::fmt::Debug for Helper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Helper").finish_non_exhaustive()
    }
}
