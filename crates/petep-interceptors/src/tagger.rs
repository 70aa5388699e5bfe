//! 规则打标拦截器。
//!
//! # 教案式说明
//! - **意图（Why）**：后续拦截器（或外部工具）常需要按“这条 PDU 属于哪类流量”分流；打标把分类逻辑
//!   集中在一处，其他拦截器只需检查标签。
//! - **逻辑（How）**：每条规则由若干子规则组成，按 `all`/`any` 组合求值；规则按声明顺序评估，命中即
//!   添加标签，后续规则可以基于前面添加的标签继续判断（`has_tag` 子规则）。
//! - **契约（What）**：
//!   - 已禁用或 PDU 已带同名标签的规则被跳过；
//!   - 带 [`NO_TAGGER`] 且不带 [`TAGGER`] 的 PDU 原样放行；
//!   - 标签为 [`DROP`] 的规则命中时丢弃 PDU，后续规则不再评估。

use std::sync::atomic::{AtomicU64, Ordering};

use petep_core::{
    CoreError, Destination, Helper, Interceptor, InterceptorDescriptor, KeyValue, LogSeverity,
    Pdu, PipelineError, Result, bytes,
};
use serde::Deserialize;

/// 跳过打标的标记。
pub const NO_TAGGER: &str = "no_tagger";
/// 与 [`NO_TAGGER`] 同时存在时强制打标。
pub const TAGGER: &str = "tagger";
/// 命中即丢弃 PDU 的保留标签。
pub const DROP: &str = "drop";

/// 子规则的组合方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    /// 全部子规则成立。
    #[default]
    All,
    /// 任一子规则成立。
    Any,
}

/// 配置中的 PDU 目的地。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    Client,
    Server,
}

impl From<DestinationConfig> for Destination {
    fn from(value: DestinationConfig) -> Self {
        match value {
            DestinationConfig::Client => Destination::Client,
            DestinationConfig::Server => Destination::Server,
        }
    }
}

/// 子规则配置，以 `kind` 字段区分种类。
///
/// 文本数据按 UTF-8 编码为字节后参与匹配。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SubruleConfig {
    /// 负载包含 `data`；给出 `index` 时要求恰好出现在该偏移。
    Contains {
        data: String,
        #[serde(default)]
        index: Option<usize>,
    },
    StartsWith {
        data: String,
    },
    EndsWith {
        data: String,
    },
    Destination {
        destination: DestinationConfig,
    },
    /// 代理代码完全相等。
    Proxy {
        code: String,
    },
    HasTag {
        tag: String,
    },
    /// 负载长度完全相等。
    Size {
        exact: usize,
    },
}

/// 单条打标规则配置。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagRuleConfig {
    pub tag: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: RuleMode,
    pub subrules: Vec<SubruleConfig>,
}

fn enabled_by_default() -> bool {
    true
}

impl TagRuleConfig {
    pub fn new(tag: impl Into<String>, mode: RuleMode, subrules: Vec<SubruleConfig>) -> Self {
        Self {
            tag: tag.into(),
            enabled: true,
            mode,
            subrules,
        }
    }
}

/// 打标拦截器配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaggerConfig {
    pub rules: Vec<TagRuleConfig>,
}

impl TaggerConfig {
    /// 校验全部规则。
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    fn compile(&self) -> Result<Vec<TagRule>> {
        self.rules.iter().map(TagRule::compile).collect()
    }
}

#[derive(Debug)]
enum Subrule {
    Contains { data: Vec<u8>, index: Option<usize> },
    StartsWith(Vec<u8>),
    EndsWith(Vec<u8>),
    Destination(Destination),
    Proxy(String),
    HasTag(String),
    Size(usize),
}

impl Subrule {
    fn compile(rule: &str, config: &SubruleConfig) -> Result<Self> {
        Ok(match config {
            SubruleConfig::Contains { data, index } => Subrule::Contains {
                data: bytes::bytes_of(non_empty(rule, data)?),
                index: *index,
            },
            SubruleConfig::StartsWith { data } => {
                Subrule::StartsWith(bytes::bytes_of(non_empty(rule, data)?))
            }
            SubruleConfig::EndsWith { data } => {
                Subrule::EndsWith(bytes::bytes_of(non_empty(rule, data)?))
            }
            SubruleConfig::Destination { destination } => Subrule::Destination((*destination).into()),
            SubruleConfig::Proxy { code } => Subrule::Proxy(non_empty(rule, code)?.to_owned()),
            SubruleConfig::HasTag { tag } => Subrule::HasTag(non_empty(rule, tag)?.to_owned()),
            SubruleConfig::Size { exact } => Subrule::Size(*exact),
        })
    }

    fn test(&self, pdu: &Pdu) -> bool {
        let buffer = pdu.buffer();
        match self {
            Subrule::Contains { data, index: None } => bytes::contains(buffer, data),
            Subrule::Contains {
                data,
                index: Some(index),
            } => bytes::contains_at(buffer, data, *index),
            Subrule::StartsWith(data) => bytes::starts_with(buffer, data),
            Subrule::EndsWith(data) => bytes::ends_with(buffer, data),
            Subrule::Destination(destination) => pdu.destination() == *destination,
            Subrule::Proxy(code) => pdu.proxy().code() == code,
            Subrule::HasTag(tag) => pdu.has_tag(tag),
            Subrule::Size(exact) => pdu.size() == *exact,
        }
    }
}

/// 文本类子规则的数据不能为空。
fn non_empty<'a>(rule: &str, data: &'a str) -> Result<&'a str> {
    if data.is_empty() {
        Err(PipelineError::invalid_config(format!(
            "tag rule `{rule}` has a subrule with empty data"
        )))
    } else {
        Ok(data)
    }
}

#[derive(Debug)]
struct TagRule {
    tag: String,
    enabled: bool,
    mode: RuleMode,
    subrules: Vec<Subrule>,
}

impl TagRule {
    fn compile(config: &TagRuleConfig) -> Result<Self> {
        if config.tag.is_empty() {
            return Err(PipelineError::invalid_config("tag rule has an empty tag"));
        }
        if config.subrules.is_empty() {
            return Err(PipelineError::invalid_config(format!(
                "tag rule `{}` has no subrules",
                config.tag
            )));
        }
        let subrules = config
            .subrules
            .iter()
            .map(|subrule| Subrule::compile(&config.tag, subrule))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tag: config.tag.clone(),
            enabled: config.enabled,
            mode: config.mode,
            subrules,
        })
    }

    fn matches(&self, pdu: &Pdu) -> bool {
        match self.mode {
            RuleMode::All => self.subrules.iter().all(|subrule| subrule.test(pdu)),
            RuleMode::Any => self.subrules.iter().any(|subrule| subrule.test(pdu)),
        }
    }
}

/// 按规则给 PDU 打标签的拦截器。
#[derive(Debug)]
pub struct TagInterceptor {
    descriptor: InterceptorDescriptor,
    rules: Vec<TagRule>,
    tagged: AtomicU64,
    dropped: AtomicU64,
}

impl TagInterceptor {
    pub const CODE: &'static str = "petep.interceptors.tagger";

    pub fn new(config: &TaggerConfig) -> Result<Self> {
        Ok(Self {
            descriptor: InterceptorDescriptor::new(Self::CODE, "Rule tagger"),
            rules: config.compile()?,
            tagged: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// 累计添加的标签数。
    pub fn tagged(&self) -> u64 {
        self.tagged.load(Ordering::Relaxed)
    }

    /// 累计丢弃的 PDU 数。
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Interceptor for TagInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        self.descriptor.clone()
    }

    fn intercept(&self, pdu: &mut Pdu, helper: &Helper) -> Result<bool, CoreError> {
        if pdu.has_tag(NO_TAGGER) && !pdu.has_tag(TAGGER) {
            return Ok(true);
        }

        for rule in &self.rules {
            if !rule.enabled || pdu.has_tag(&rule.tag) || !rule.matches(pdu) {
                continue;
            }
            if rule.tag == DROP {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                let fields = [KeyValue::new("petep.pdu.connection", pdu.connection().code())];
                helper
                    .logger()
                    .log_with_fields(LogSeverity::Debug, "PDU dropped by tag rule", &fields);
                return Ok(false);
            }
            pdu.add_tag(rule.tag.clone());
            self.tagged.fetch_add(1, Ordering::Relaxed);
        }
        Ok(true)
    }
}
