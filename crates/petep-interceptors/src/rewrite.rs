use std::sync::atomic::{AtomicU64, Ordering};

use petep_core::{
    CoreError, Helper, Interceptor, InterceptorDescriptor, KeyValue, LogSeverity, Pdu,
    PipelineError, Result, RewriteRule, RewriteSet,
};
use serde::Deserialize;

const ATTR_MATCHES: &str = "petep.interceptors.rewrite.matches";
const ATTR_SIZE_AFTER: &str = "petep.interceptors.rewrite.size_after";

/// 单条文本替换规则，模式与替换均按 UTF-8 编码为字节。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteRuleConfig {
    pub pattern: String,
    pub replacement: String,
}

impl RewriteRuleConfig {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// 重写拦截器配置。
///
/// # 契约说明（What）
/// - `proxy`：仅处理该代理代码的 PDU；缺省时处理全部代理；
/// - `rules`：按声明顺序依次作用，后一条规则扫描前一条规则的输出；
/// - 任一规则模式为空时 [`RewriteConfig::compile`] 返回 [`PipelineError::InvalidConfig`]。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    pub proxy: Option<String>,
    pub rules: Vec<RewriteRuleConfig>,
}

impl RewriteConfig {
    /// 将文本规则编译为 [`RewriteSet`]。
    pub fn compile(&self) -> Result<RewriteSet> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                RewriteRule::from_text(&rule.pattern, &rule.replacement).map_err(|_| {
                    PipelineError::invalid_config(format!(
                        "rewrite rule #{index} has an empty pattern"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(RewriteSet::new)
    }
}

/// 按规则集合替换 PDU 负载的拦截器，始终放行。
///
/// # 教案式说明
/// - **意图（Why）**：最常见的篡改需求是“把负载里的 A 换成 B”，例如替换颜色名、主机名或版本号；
///   把规则外置为配置后无需编写代码。
/// - **逻辑（How）**：构造时编译规则，拦截时先按代理代码过滤，再调用 [`Pdu::apply_rewrites`]；
///   命中数累加到原子计数器，发生替换时输出一条 `Debug` 日志。
/// - **契约（What）**：不匹配代理代码的 PDU 原样放行；规则全部未命中时缓冲区不被替换。
#[derive(Debug)]
pub struct RewriteInterceptor {
    descriptor: InterceptorDescriptor,
    proxy: Option<String>,
    rules: RewriteSet,
    matches: AtomicU64,
}

impl RewriteInterceptor {
    pub const CODE: &'static str = "petep.interceptors.rewrite";

    pub fn new(config: &RewriteConfig) -> Result<Self> {
        Ok(Self {
            descriptor: InterceptorDescriptor::new(Self::CODE, "Byte rewriter"),
            proxy: config.proxy.clone(),
            rules: config.compile()?,
            matches: AtomicU64::new(0),
        })
    }

    /// 累计替换次数。
    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    fn applies_to(&self, pdu: &Pdu) -> bool {
        self.proxy
            .as_deref()
            .is_none_or(|code| code == pdu.proxy().code())
    }
}

impl Interceptor for RewriteInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        self.descriptor.clone()
    }

    fn intercept(&self, pdu: &mut Pdu, helper: &Helper) -> Result<bool, CoreError> {
        if !self.applies_to(pdu) {
            return Ok(true);
        }

        let report = pdu.apply_rewrites(&self.rules);
        if report.changed() {
            self.matches
                .fetch_add(report.matches as u64, Ordering::Relaxed);
            let matches = report.matches.to_string();
            let size_after = report.size_after.to_string();
            let fields = [
                KeyValue::new(ATTR_MATCHES, matches.as_str()),
                KeyValue::new(ATTR_SIZE_AFTER, size_after.as_str()),
            ];
            helper
                .logger()
                .log_with_fields(LogSeverity::Debug, "PDU rewritten", &fields);
        }
        Ok(true)
    }
}
