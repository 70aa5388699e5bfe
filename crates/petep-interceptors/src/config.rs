use std::sync::Arc;

use petep_core::{
    ChainDirection, Interceptor, InterceptorHandle, InterceptorRegistry, Result,
};
#[cfg(feature = "toml")]
use petep_core::PipelineError;
use serde::Deserialize;

use crate::{
    info::{InfoLogConfig, PduInfoInterceptor},
    rewrite::{RewriteConfig, RewriteInterceptor},
    tagger::{TagInterceptor, TaggerConfig},
};

/// 内置拦截器的聚合配置。
///
/// # 教案式说明
/// - **意图（Why）**：宿主通常从一份配置文件装配整条链路；聚合结构让“哪些拦截器启用、各自参数”
///   一次解析、一次校验。
/// - **结构（How）**：每个段落可选，缺省即不安装对应拦截器。
///   [`InterceptorsConfig::install`] 按 `tagger → rewrite → info` 的固定顺序注册：先分类，再改写，
///   最后记录改写后的结果。
/// - **契约（What）**：
///   - 配置只在构造时读取，拦截器之后不再访问任何全局状态；
///   - 任一段落校验失败时返回 [`PipelineError::InvalidConfig`](petep_core::PipelineError::InvalidConfig)，
///     `install` 在注册任何拦截器之前完成全部校验。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptorsConfig {
    pub tagger: Option<TaggerConfig>,
    pub rewrite: Option<RewriteConfig>,
    pub info: Option<InfoLogConfig>,
}

impl InterceptorsConfig {
    /// 从 TOML 文本解析并校验配置。
    ///
    /// ```toml
    /// [info]
    /// buffer = false
    ///
    /// [rewrite]
    /// proxy = "petep"
    /// [[rewrite.rules]]
    /// pattern = "red"
    /// replacement = "blue"
    /// ```
    #[cfg(feature = "toml")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| PipelineError::invalid_config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验全部段落。
    pub fn validate(&self) -> Result<()> {
        self.build().map(|_| ())
    }

    /// 构造启用的拦截器，顺序即注册顺序。
    pub fn build(&self) -> Result<Vec<Arc<dyn Interceptor>>> {
        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();
        if let Some(tagger) = &self.tagger {
            interceptors.push(Arc::new(TagInterceptor::new(tagger)?));
        }
        if let Some(rewrite) = &self.rewrite {
            interceptors.push(Arc::new(RewriteInterceptor::new(rewrite)?));
        }
        if let Some(info) = &self.info {
            interceptors.push(Arc::new(PduInfoInterceptor::new(info.clone())));
        }
        Ok(interceptors)
    }

    /// 把启用的拦截器注册到 `direction` 链路尾部。
    pub fn install(
        &self,
        registry: &InterceptorRegistry,
        direction: ChainDirection,
    ) -> Result<Vec<InterceptorHandle>> {
        self.build()?
            .into_iter()
            .map(|interceptor| registry.register_shared(direction, interceptor))
            .collect()
    }
}
