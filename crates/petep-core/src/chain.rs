//! 单方向拦截链路与 PDU 遍历状态机。
//!
//! # 教案式说明
//! - **意图（Why）**：把“只要返回 true 就继续循环”的隐式写法改为显式状态机，转发、丢弃、失败三种终态
//!   各自可见、可单独测试。
//! - **逻辑（How）**：`Ready → Running(i) → { Running(i + 1) | Forwarded | Dropped(i) | Failed(i) }`。
//!   每个拦截器返回后（无论继续还是丢弃），链路把 PDU 的 `last_interceptor` 更新为该拦截器，
//!   因此下一个拦截器与最终转发都能看到最近的处理者。
//! - **契约（What）**：
//!   - 链路在构造后只读，并发遍历无需同步；
//!   - 同一次遍历内拦截器严格串行：前一个的返回值与 PDU 修改完全可见后才调用下一个；
//!   - 拦截器返回 `Err` 或 panic 时本次遍历以 [`PipelineError::InterceptorFailure`] 结束，
//!     不会带着未定义结果继续；链路对后续 PDU 的处理不受影响。

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    error::{CoreError, PipelineError, Result},
    helper::Helper,
    interceptor::Interceptor,
    observability::{KeyValue, LogSeverity},
    pdu::{InterceptorRef, Pdu},
    registry::ChainDirection,
};

/// 单次遍历的状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    /// 尚未开始。
    Ready,
    /// 即将调用第 `i` 个拦截器。
    Running(usize),
    /// 全部拦截器都选择继续，PDU 交还传输层转发。
    Forwarded,
    /// 第 `i` 个拦截器选择丢弃。
    Dropped(usize),
    /// 第 `i` 个拦截器失败。
    Failed(usize),
}

impl PassState {
    /// 从 `position` 开始一次遍历；`position` 越过链尾时直接转发。
    pub fn start_at(position: usize, len: usize) -> Self {
        if position < len {
            PassState::Running(position)
        } else {
            PassState::Forwarded
        }
    }

    /// 根据当前拦截器的返回值推进状态。非 `Running` 状态保持不变。
    pub fn advance(self, proceed: bool, len: usize) -> Self {
        match self {
            PassState::Ready => PassState::start_at(0, len),
            PassState::Running(index) if !proceed => PassState::Dropped(index),
            PassState::Running(index) => PassState::start_at(index + 1, len),
            terminal => terminal,
        }
    }

    /// 当前拦截器失败。
    pub fn fail(self) -> Self {
        match self {
            PassState::Running(index) => PassState::Failed(index),
            other => other,
        }
    }

    /// 是否已到达终态。
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PassState::Forwarded | PassState::Dropped(_) | PassState::Failed(_)
        )
    }
}

/// 遍历的正常结果。失败以 `Err` 返回。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// PDU 应被转发。
    Forwarded,
    /// PDU 被 `by` 丢弃。
    Dropped { by: InterceptorRef },
}

impl PassOutcome {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, PassOutcome::Forwarded)
    }
}

pub(crate) struct ChainEntry {
    pub(crate) reference: InterceptorRef,
    pub(crate) interceptor: Arc<dyn Interceptor>,
}

/// 冻结后的单方向拦截链路。
#[derive(Clone)]
pub struct InterceptorChain {
    direction: ChainDirection,
    entries: Arc<[ChainEntry]>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("direction", &self.direction)
            .field("interceptors", &self.interceptors().collect::<Vec<_>>())
            .finish()
    }
}

impl InterceptorChain {
    pub(crate) fn new(direction: ChainDirection, entries: Vec<ChainEntry>) -> Self {
        Self {
            direction,
            entries: entries.into(),
        }
    }

    pub fn direction(&self) -> ChainDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按执行顺序列出拦截器身份。
    pub fn interceptors(&self) -> impl Iterator<Item = &InterceptorRef> {
        self.entries.iter().map(|entry| &entry.reference)
    }

    pub(crate) fn instances(&self) -> impl Iterator<Item = &Arc<dyn Interceptor>> {
        self.entries.iter().map(|entry| &entry.interceptor)
    }

    /// 从链首开始遍历。
    pub fn dispatch(&self, pdu: &mut Pdu, helper: &Helper) -> Result<PassOutcome> {
        self.dispatch_from(pdu, 0, helper)
    }

    /// 从 `position` 开始遍历，用于在某个拦截器之后重新注入 PDU。
    pub fn dispatch_from(&self, pdu: &mut Pdu, position: usize, helper: &Helper) -> Result<PassOutcome> {
        let len = self.entries.len();
        let mut state = PassState::start_at(position, len);
        let mut failure = None;

        while let PassState::Running(index) = state {
            let entry = &self.entries[index];
            match invoke(entry.interceptor.as_ref(), pdu, helper) {
                Ok(proceed) => {
                    pdu.set_last_interceptor(entry.reference.clone());
                    state = state.advance(proceed, len);
                }
                Err(source) => {
                    failure = Some(source);
                    state = state.fail();
                }
            }
        }

        match (state, failure) {
            (PassState::Failed(index), Some(source)) => {
                let reference = &self.entries[index].reference;
                let err = PipelineError::InterceptorFailure {
                    code: reference.code().to_owned(),
                    name: reference.name().to_owned(),
                    position: index,
                    source,
                };
                helper
                    .logger()
                    .error("interceptor failed, PDU pass aborted", Some(&err));
                Err(err)
            }
            (PassState::Dropped(index), _) => {
                let by = self.entries[index].reference.clone();
                self.trace_terminal(helper, pdu, "dropped");
                Ok(PassOutcome::Dropped { by })
            }
            // 其余终态只剩 Forwarded。
            _ => {
                self.trace_terminal(helper, pdu, "forwarded");
                Ok(PassOutcome::Forwarded)
            }
        }
    }

    fn trace_terminal(&self, helper: &Helper, pdu: &Pdu, outcome: &'static str) {
        let size = pdu.size().to_string();
        let fields = [
            KeyValue::new("petep.chain.direction", self.direction.as_str()),
            KeyValue::new("petep.chain.outcome", outcome),
            KeyValue::new("petep.pdu.size", size.as_str()),
        ];
        helper
            .logger()
            .log_with_fields(LogSeverity::Debug, "PDU pass finished", &fields);
    }
}

/// 调用单个拦截器，把 panic 转换为错误。
fn invoke(interceptor: &dyn Interceptor, pdu: &mut Pdu, helper: &Helper) -> Result<bool, CoreError> {
    match panic::catch_unwind(AssertUnwindSafe(|| interceptor.intercept(pdu, helper))) {
        Ok(result) => result,
        Err(payload) => Err(CoreError::from_panic(payload)),
    }
}
