//! 动作分发器
//!
//! 把最终意图（来自路由决策或完成的流程）映射到能力处理器并调用。
//! 构建失败被捕获并转为「能力不可用」的失败结果；未映射的意图回一句通用确认并记日志。

use serde_json::Value;

use crate::dispatch::registry::CapabilityRegistry;
use crate::engine::types::ActionResult;

pub struct ActionDispatcher {
    registry: CapabilityRegistry,
}

impl ActionDispatcher {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.registry
    }

    /// 分发一个已定意图；永不向上抛错
    pub async fn dispatch(&mut self, intent: &str, payload: Value) -> ActionResult {
        let Some(capability) = self.registry.capability_for(intent).map(String::from) else {
            tracing::info!(%intent, "no capability mapped, acknowledging");
            return ActionResult::success("Okay, noted. I can't act on that yet though.");
        };

        let handler = match self.registry.get_or_build(&capability) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(%capability, error = %e, "capability construction failed");
                return ActionResult::failure("capability unavailable");
            }
        };

        if let Err(e) = handler.available() {
            tracing::warn!(%capability, error = %e, "capability probe failed");
            return ActionResult::failure("capability unavailable");
        }

        tracing::debug!(%intent, %capability, "dispatching");
        handler.handle(intent, &payload).await
    }
}
