use std::{borrow::Cow, fmt};

use crate::{error::CoreError, helper::Helper, pdu::Pdu};

/// 描述拦截器身份的元数据。
///
/// # 契约说明（What）
/// - `code`：稳定标识，建议使用小写 `vendor.component` 风格，出现在日志与 `last_interceptor` 中；
/// - `name`：人类可读名称，供诊断输出展示。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptorDescriptor {
    code: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl InterceptorDescriptor {
    pub fn new(code: impl Into<Cow<'static, str>>, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// 构造匿名描述，常用于测试或脚本中未命名的拦截器。
    pub fn anonymous(stage: impl Into<Cow<'static, str>>) -> Self {
        let stage = stage.into();
        Self {
            code: Cow::Owned(format!("anonymous.{stage}")),
            name: Cow::Owned(format!("anonymous interceptor {stage}")),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 拦截器合约：检查、标记、记录或修改在代理中流转的 PDU。
///
/// # 设计背景（Why）
/// - 脚本或模块以“带私有状态的处理单元”形式注册拦截器；链路只关心三件事：身份、对 PDU 的处理结果、
///   以及激活/停止两个生命周期钩子。
///
/// # 契约说明（What）
/// - `intercept` 返回 `Ok(true)` 表示交给下一个拦截器，`Ok(false)` 表示丢弃该 PDU；
///   返回 `Err` 或 panic 会终止本次遍历并向传输层报告 [`PipelineError::InterceptorFailure`](crate::PipelineError::InterceptorFailure)；
/// - 同一实例会被多个连接的遍历并发调用（`&self`），内部可变状态必须自行同步
///   （原子计数或锁）；
/// - `prepare` 在激活时调用一次，失败会中止激活；`stop` 在链路停止时调用一次。
///
/// # 风险提示（Trade-offs）
/// - 拦截器不应在 `intercept` 中阻塞等待 I/O：遍历在传输层工作线程上同步执行。
pub trait Interceptor: Send + Sync + 'static {
    /// 返回拦截器元数据。
    fn descriptor(&self) -> InterceptorDescriptor;

    /// 激活前的准备工作。
    fn prepare(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// 处理一条 PDU。
    fn intercept(&self, pdu: &mut Pdu, helper: &Helper) -> Result<bool, CoreError>;

    /// 链路停止时的清理工作。
    fn stop(&self) {}
}

/// 以闭包实现的拦截器，对应脚本中 `registerInterceptor({ intercept })` 的写法。
pub struct FnInterceptor<F> {
    descriptor: InterceptorDescriptor,
    intercept: F,
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterceptor")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Pdu, &Helper) -> Result<bool, CoreError> + Send + Sync + 'static,
{
    fn descriptor(&self) -> InterceptorDescriptor {
        self.descriptor.clone()
    }

    fn intercept(&self, pdu: &mut Pdu, helper: &Helper) -> Result<bool, CoreError> {
        (self.intercept)(pdu, helper)
    }
}

/// 以闭包构造拦截器。
pub fn interceptor_fn<F>(
    code: impl Into<Cow<'static, str>>,
    name: impl Into<Cow<'static, str>>,
    intercept: F,
) -> FnInterceptor<F>
where
    F: Fn(&mut Pdu, &Helper) -> Result<bool, CoreError> + Send + Sync + 'static,
{
    FnInterceptor {
        descriptor: InterceptorDescriptor::new(code, name),
        intercept,
    }
}
