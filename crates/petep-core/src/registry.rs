//! 拦截器注册表：构建阶段收集注册，激活后冻结为只读链路。
//!
//! # 教案式说明
//! - **意图（Why）**：脚本在加载期随时注册拦截器，而调度期的链路必须不可变，避免遍历时被插入导致迭代失效。
//!   注册表把两个阶段显式分开：`register*` 只在激活前有效，[`InterceptorRegistry::activate`] 之后统一拒绝。
//! - **逻辑（How）**：注册表以 `parking_lot::Mutex` 保护两个方向的有序列表与关闭标记；激活时先依次调用
//!   每个拦截器的 `prepare`，全部成功后置位关闭标记并克隆 `Arc` 构建 [`InterceptorChain`]。
//! - **契约（What）**：
//!   - 位置即注册顺序（从零计数），没有优先级或依赖图；
//!   - 激活后注册返回 [`PipelineError::RegistrationClosed`]，已有链路内容不受影响；
//!   - 任一 `prepare` 失败时激活整体放弃，注册表保持开放，可修正后再次激活。

use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{
    chain::{ChainEntry, InterceptorChain},
    error::{PipelineError, Result},
    helper::Helper,
    interceptor::Interceptor,
    observability::{KeyValue, LogSeverity, Logger},
    pdu::{Destination, InterceptorRef},
    pipeline::InterceptorPipeline,
};

/// 链路方向。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainDirection {
    /// 客户端发往服务端（PDU 目的地为 [`Destination::Server`]）。
    ClientToServer,
    /// 服务端发往客户端（PDU 目的地为 [`Destination::Client`]）。
    ServerToClient,
}

impl ChainDirection {
    /// 依据 PDU 目的地选择链路方向。
    pub fn for_destination(destination: Destination) -> Self {
        match destination {
            Destination::Server => ChainDirection::ClientToServer,
            Destination::Client => ChainDirection::ServerToClient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainDirection::ClientToServer => "client-to-server",
            ChainDirection::ServerToClient => "server-to-client",
        }
    }
}

impl fmt::Display for ChainDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 注册成功后返回的稳定句柄，用于诊断。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InterceptorHandle {
    direction: ChainDirection,
    position: usize,
    code: Arc<str>,
}

impl InterceptorHandle {
    pub fn direction(&self) -> ChainDirection {
        self.direction
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// 注册信息快照，顺序与执行顺序一致。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptorRegistration {
    direction: ChainDirection,
    interceptor: InterceptorRef,
}

impl InterceptorRegistration {
    pub fn direction(&self) -> ChainDirection {
        self.direction
    }

    pub fn code(&self) -> &str {
        self.interceptor.code()
    }

    pub fn name(&self) -> &str {
        self.interceptor.name()
    }

    pub fn position(&self) -> usize {
        self.interceptor.position()
    }
}

struct Registered {
    reference: InterceptorRef,
    interceptor: Arc<dyn Interceptor>,
}

#[derive(Default)]
struct RegistryState {
    closed: bool,
    client_to_server: Vec<Registered>,
    server_to_client: Vec<Registered>,
}

impl RegistryState {
    fn list(&self, direction: ChainDirection) -> &Vec<Registered> {
        match direction {
            ChainDirection::ClientToServer => &self.client_to_server,
            ChainDirection::ServerToClient => &self.server_to_client,
        }
    }

    fn list_mut(&mut self, direction: ChainDirection) -> &mut Vec<Registered> {
        match direction {
            ChainDirection::ClientToServer => &mut self.client_to_server,
            ChainDirection::ServerToClient => &mut self.server_to_client,
        }
    }
}

/// 拦截器注册表。
#[derive(Default)]
pub struct InterceptorRegistry {
    state: Mutex<RegistryState>,
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InterceptorRegistry")
            .field("closed", &state.closed)
            .field("client_to_server", &state.client_to_server.len())
            .field("server_to_client", &state.server_to_client.len())
            .finish()
    }
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册拦截器，追加到 `direction` 链路尾部。
    pub fn register(
        &self,
        direction: ChainDirection,
        interceptor: impl Interceptor,
    ) -> Result<InterceptorHandle> {
        self.register_shared(direction, Arc::new(interceptor))
    }

    /// 注册共享实例；同一实例可同时挂到两个方向，内部状态因此跨方向共享。
    pub fn register_shared(
        &self,
        direction: ChainDirection,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<InterceptorHandle> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PipelineError::RegistrationClosed { direction });
        }

        let descriptor = interceptor.descriptor();
        let list = state.list_mut(direction);
        let position = list.len();
        let reference = InterceptorRef::new(descriptor.code(), descriptor.name(), position);
        let handle = InterceptorHandle {
            direction,
            position,
            code: Arc::from(descriptor.code()),
        };
        list.push(Registered {
            reference,
            interceptor,
        });
        Ok(handle)
    }

    /// 是否已激活。
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 返回 `direction` 链路的注册快照。
    pub fn snapshot(&self, direction: ChainDirection) -> Vec<InterceptorRegistration> {
        self.state
            .lock()
            .list(direction)
            .iter()
            .map(|registered| InterceptorRegistration {
                direction,
                interceptor: registered.reference.clone(),
            })
            .collect()
    }

    /// 激活注册表：准备全部拦截器并冻结两条链路。
    ///
    /// # 执行步骤（How）
    /// 1. 持锁检查关闭标记，已激活时返回 [`PipelineError::AlreadyActivated`]；
    /// 2. 按方向与注册顺序调用 `prepare`，首个失败即返回 [`PipelineError::PrepareFailed`]；
    /// 3. 置位关闭标记，克隆 `Arc` 构建两条只读链路与共享的 [`Helper`]。
    ///
    /// 准备阶段全程持锁，激活与并发注册之间不存在竞态窗口。
    pub fn activate(&self, logger: Arc<dyn Logger>) -> Result<InterceptorPipeline> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PipelineError::AlreadyActivated);
        }

        for direction in [ChainDirection::ClientToServer, ChainDirection::ServerToClient] {
            for registered in state.list(direction) {
                registered
                    .interceptor
                    .prepare()
                    .map_err(|source| PipelineError::PrepareFailed {
                        code: registered.reference.code().to_owned(),
                        source,
                    })?;
            }
        }

        state.closed = true;
        let client_to_server = freeze(ChainDirection::ClientToServer, &state);
        let server_to_client = freeze(ChainDirection::ServerToClient, &state);

        let c2s = client_to_server.len().to_string();
        let s2c = server_to_client.len().to_string();
        let fields = [
            KeyValue::new("petep.chain.client_to_server", c2s.as_str()),
            KeyValue::new("petep.chain.server_to_client", s2c.as_str()),
        ];
        logger.log_with_fields(LogSeverity::Info, "interceptor chains activated", &fields);

        Ok(InterceptorPipeline::new(
            client_to_server,
            server_to_client,
            Helper::new(logger),
        ))
    }
}

fn freeze(direction: ChainDirection, state: &RegistryState) -> InterceptorChain {
    let entries = state
        .list(direction)
        .iter()
        .map(|registered| ChainEntry {
            reference: registered.reference.clone(),
            interceptor: Arc::clone(&registered.interceptor),
        })
        .collect();
    InterceptorChain::new(direction, entries)
}
