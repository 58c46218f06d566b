//! 对话层：多轮槽位对话与会话状态机
//!
//! 每个会话同一时刻至多一个非 Idle 流程；流程以带标签的 FlowTurn 返回结果
//! （NeedMoreInfo / Completed / Cancelled / Failed / Rejected），从不以异常做控制流。

pub mod auth;
pub mod extract;
pub mod listing;
pub mod manager;
pub mod schedule;
pub mod state;

use async_trait::async_trait;

use crate::engine::types::Utterance;
pub use auth::{AlwaysAuthorized, AuthStatus, AuthorizationProbe};
pub use listing::ListingFlow;
pub use manager::DialogueManager;
pub use schedule::ScheduleFlow;
pub use state::{FlowStage, FlowState, FlowTurn, ListedItem};

/// 对话流程 trait：声明可触发的意图，由管理器驱动 start / advance
#[async_trait]
pub trait DialogueFlow: Send + Sync {
    /// 流程类型名（写入 FlowState.flow_kind，advance 时按此找回流程）
    fn kind(&self) -> &'static str;

    /// 该意图是否由本流程处理
    fn handles(&self, intent: &str) -> bool;

    /// 触发意图到达且会话空闲时调用；前置校验失败应返回 Rejected 并保持 Idle
    async fn start(&self, state: &mut FlowState, utterance: &Utterance) -> FlowTurn;

    /// 流程活跃期间的后续轮次
    async fn advance(&self, state: &mut FlowState, utterance: &Utterance) -> FlowTurn;
}
