#![deny(unsafe_code)]
#![doc = "petep-interceptors: 建立在 petep-core 之上的内置拦截器。"]
#![doc = ""]
#![doc = "== 组件 =="]
#![doc = "- [`PduInfoInterceptor`]：按字段开关输出 PDU 概要；"]
#![doc = "- [`RewriteInterceptor`]：按代理过滤后依次应用文本替换规则；"]
#![doc = "- [`TagInterceptor`]：按子规则组合给 PDU 打标签，`drop` 标签丢弃 PDU。"]
#![doc = ""]
#![doc = "三者都只依赖 petep-core 的公开 API，内部计数均为原子操作，可被多个连接并发调用。"]

pub mod config;
pub mod info;
pub mod rewrite;
pub mod tagger;

pub use config::InterceptorsConfig;
pub use info::{InfoLogConfig, PduInfoInterceptor};
pub use rewrite::{RewriteConfig, RewriteInterceptor, RewriteRuleConfig};
pub use tagger::{
    DestinationConfig, RuleMode, SubruleConfig, TagInterceptor, TagRuleConfig, TaggerConfig,
};
