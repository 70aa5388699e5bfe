use std::{
    borrow::Cow,
    fmt::Write as _,
    sync::atomic::{AtomicU64, Ordering},
};

use petep_core::{
    CoreError, Helper, Interceptor, InterceptorDescriptor, KeyValue, LogSeverity, Pdu,
};
use serde::Deserialize;

const ATTR_PROXY: &str = "petep.interceptors.info.proxy";
const ATTR_CONNECTION: &str = "petep.interceptors.info.connection";

/// 信息日志输出字段开关。
///
/// # 教案式说明
/// - **意图（Why）**：排障时往往只关心 PDU 的少数几个维度，全量输出（尤其是十六进制缓冲区）在高流量下
///   会淹没日志；逐字段开关让运维按需裁剪。
/// - **契约（What）**：缺省值为全部开启；全部关闭时拦截器不输出任何日志，但仍然计数并放行。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfoLogConfig {
    pub kind: bool,
    pub destination: bool,
    pub proxy: bool,
    pub connection: bool,
    pub interceptor: bool,
    pub size: bool,
    pub tags: bool,
    pub buffer: bool,
}

impl Default for InfoLogConfig {
    fn default() -> Self {
        Self {
            kind: true,
            destination: true,
            proxy: true,
            connection: true,
            interceptor: true,
            size: true,
            tags: true,
            buffer: true,
        }
    }
}

impl InfoLogConfig {
    /// 全部字段关闭。
    pub fn silent() -> Self {
        Self {
            kind: false,
            destination: false,
            proxy: false,
            connection: false,
            interceptor: false,
            size: false,
            tags: false,
            buffer: false,
        }
    }
}

/// 以多行文本记录 PDU 概要信息的拦截器，始终放行。
#[derive(Debug)]
pub struct PduInfoInterceptor {
    descriptor: InterceptorDescriptor,
    config: InfoLogConfig,
    seen: AtomicU64,
}

impl PduInfoInterceptor {
    pub const CODE: &'static str = "petep.interceptors.info";

    pub fn new(config: InfoLogConfig) -> Self {
        Self {
            descriptor: InterceptorDescriptor::new(Self::CODE, "PDU information logger"),
            config,
            seen: AtomicU64::new(0),
        }
    }

    /// 已处理的 PDU 数量。
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    /// 按配置渲染 PDU 描述；没有任何字段开启时返回 `None`。
    pub fn describe(&self, pdu: &Pdu) -> Option<String> {
        let config = &self.config;
        let mut text = String::new();

        // 写入 String 不会失败，忽略 fmt::Result。
        if config.kind {
            let _ = write!(text, "\n- kind: {}", pdu.kind());
        }
        if config.destination {
            let _ = write!(text, "\n- destination: {}", pdu.destination());
        }
        if config.proxy {
            let proxy = pdu.proxy();
            let _ = write!(text, "\n- proxy: {} ({})", proxy.name(), proxy.code());
        }
        if config.connection {
            let _ = write!(text, "\n- connection: {}", pdu.connection().code());
        }
        if config.interceptor {
            let last: Cow<'_, str> = match pdu.last_interceptor() {
                Some(last) => Cow::Owned(format!("{} ({})", last.name(), last.code())),
                None => Cow::Borrowed("none"),
            };
            let _ = write!(text, "\n- last interceptor: {last}");
        }
        if config.size {
            let _ = write!(text, "\n- size: {}", pdu.size());
        }
        if config.tags {
            let _ = write!(text, "\n- tags: {}", pdu.tags().collect::<Vec<_>>().join(", "));
        }
        if config.buffer {
            let _ = write!(text, "\n- buffer: {}", pdu.buffer_hex());
        }

        (!text.is_empty()).then_some(text)
    }
}

impl Default for PduInfoInterceptor {
    fn default() -> Self {
        Self::new(InfoLogConfig::default())
    }
}

impl Interceptor for PduInfoInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        self.descriptor.clone()
    }

    fn intercept(&self, pdu: &mut Pdu, helper: &Helper) -> Result<bool, CoreError> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        if let Some(text) = self.describe(pdu) {
            let fields = [
                KeyValue::new(ATTR_PROXY, pdu.proxy().code()),
                KeyValue::new(ATTR_CONNECTION, pdu.connection().code()),
            ];
            helper.logger().log_with_fields(
                LogSeverity::Info,
                &format!("PDU information: {text}"),
                &fields,
            );
        }
        Ok(true)
    }
}
