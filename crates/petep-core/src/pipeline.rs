use crate::{
    chain::{InterceptorChain, PassOutcome},
    error::Result,
    helper::Helper,
    pdu::Pdu,
    registry::ChainDirection,
};

/// 激活后的双向拦截管线。
///
/// # 教案式说明
/// - **意图（Why）**：传输层只需要一个入口：拿到 PDU 后按目的地选链路并遍历，不必关心注册细节。
/// - **逻辑（How）**：持有两条冻结的 [`InterceptorChain`] 与共享的 [`Helper`]；
///   [`InterceptorPipeline::process`] 依据 [`ChainDirection::for_destination`] 选择链路。
/// - **契约（What）**：
///   - 管线是 `Send + Sync` 的只读结构，克隆成本为两次 `Arc` 计数递增，可在每个连接任务中持有一份；
///   - 每条 PDU 由调用方独占借用，跨连接并发处理互不可见；
///   - [`InterceptorPipeline::stop`] 按注册顺序调用每个拦截器的 `stop`，同一共享实例在两个方向各调用一次。
#[derive(Clone, Debug)]
pub struct InterceptorPipeline {
    client_to_server: InterceptorChain,
    server_to_client: InterceptorChain,
    helper: Helper,
}

impl InterceptorPipeline {
    pub(crate) fn new(
        client_to_server: InterceptorChain,
        server_to_client: InterceptorChain,
        helper: Helper,
    ) -> Self {
        Self {
            client_to_server,
            server_to_client,
            helper,
        }
    }

    /// 返回指定方向的链路。
    pub fn chain(&self, direction: ChainDirection) -> &InterceptorChain {
        match direction {
            ChainDirection::ClientToServer => &self.client_to_server,
            ChainDirection::ServerToClient => &self.server_to_client,
        }
    }

    pub fn helper(&self) -> &Helper {
        &self.helper
    }

    /// 按 PDU 目的地选择链路并从链首遍历。
    pub fn process(&self, pdu: &mut Pdu) -> Result<PassOutcome> {
        self.process_from(pdu, 0)
    }

    /// 从 `position` 开始遍历 PDU 所属方向的链路。
    pub fn process_from(&self, pdu: &mut Pdu, position: usize) -> Result<PassOutcome> {
        let direction = ChainDirection::for_destination(pdu.destination());
        self.chain(direction)
            .dispatch_from(pdu, position, &self.helper)
    }

    /// 停止全部拦截器。
    pub fn stop(&self) {
        for chain in [&self.client_to_server, &self.server_to_client] {
            for interceptor in chain.instances() {
                interceptor.stop();
            }
        }
        self.helper.logger().info("interceptor chains stopped");
    }
}
