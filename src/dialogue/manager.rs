//! 对话流程管理器
//!
//! 每会话持有一份 FlowState，不变量：任一时刻至多一个非 Idle 流程。
//! 只被逐轮 worker 独占可变访问（单写多读由编排层保证），因此内部是普通 HashMap。

use std::collections::HashMap;
use std::sync::Arc;

use crate::dialogue::state::{FlowStage, FlowState, FlowTurn, ListedItem};
use crate::dialogue::DialogueFlow;
use crate::engine::types::Utterance;

pub struct DialogueManager {
    flows: Vec<Arc<dyn DialogueFlow>>,
    sessions: HashMap<String, FlowState>,
    max_retries: u32,
}

impl DialogueManager {
    pub fn new(max_retries: u32) -> Self {
        Self {
            flows: Vec::new(),
            sessions: HashMap::new(),
            max_retries,
        }
    }

    pub fn register(&mut self, flow: Arc<dyn DialogueFlow>) {
        self.flows.push(flow);
    }

    fn state_mut(&mut self, session_id: &str) -> &mut FlowState {
        let max_retries = self.max_retries;
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| FlowState::new(max_retries))
    }

    /// 会话是否有活跃（非 Idle）流程
    pub fn is_active(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(FlowState::is_active)
            .unwrap_or(false)
    }

    /// 记录最近展示的有序列表（供列表消解流程使用）
    pub fn record_listing(&mut self, session_id: &str, items: Vec<ListedItem>) {
        tracing::debug!(session = session_id, count = items.len(), "listing recorded");
        self.state_mut(session_id).listed_items = items;
    }

    pub fn listed_items(&self, session_id: &str) -> &[ListedItem] {
        self.sessions
            .get(session_id)
            .map(|s| s.listed_items.as_slice())
            .unwrap_or(&[])
    }

    /// 若某流程声明处理该意图则尝试启动；已有活跃流程时拒绝且不影响原流程
    pub async fn try_start(
        &mut self,
        session_id: &str,
        intent: &str,
        utterance: &Utterance,
    ) -> Option<FlowTurn> {
        let flow = self.flows.iter().find(|f| f.handles(intent))?.clone();

        let state = self.state_mut(session_id);
        if state.is_active() {
            tracing::info!(
                session = session_id,
                active = ?state.flow_kind,
                rejected = intent,
                "flow start rejected, another flow is active"
            );
            return Some(FlowTurn::Rejected {
                response: "I'm still in the middle of something. Say 'cancel' if you want to \
                           drop it."
                    .to_string(),
            });
        }

        let turn = flow.start(state, utterance).await;
        Self::finalize(state, &turn);
        Some(turn)
    }

    /// 把一轮输入交给活跃流程
    pub async fn advance(&mut self, session_id: &str, utterance: &Utterance) -> FlowTurn {
        let kind = self
            .sessions
            .get(session_id)
            .and_then(|s| s.flow_kind.clone());
        let flow = kind
            .as_deref()
            .and_then(|k| self.flows.iter().find(|f| f.kind() == k).cloned());

        let Some(flow) = flow else {
            tracing::warn!(session = session_id, "advance without an active flow");
            return FlowTurn::Rejected {
                response: "Sorry, I lost track of that task. Let's start again.".to_string(),
            };
        };

        let state = self.state_mut(session_id);
        let turn = flow.advance(state, utterance).await;
        Self::finalize(state, &turn);
        turn
    }

    /// 取消活跃流程：Cancelled 为终态，立即复位 Idle；返回是否确有流程被取消
    pub fn cancel(&mut self, session_id: &str) -> bool {
        let state = self.state_mut(session_id);
        if !state.is_active() {
            return false;
        }
        tracing::info!(session = session_id, kind = ?state.flow_kind, "flow cancelled");
        state.stage = FlowStage::Cancelled;
        state.reset_to_idle();
        true
    }

    /// Completed / Failed 为终态：交接或道歉后立即复位 Idle（listed_items 保留）
    fn finalize(state: &mut FlowState, turn: &FlowTurn) {
        match turn {
            FlowTurn::Completed { .. } | FlowTurn::Failed { .. } => state.reset_to_idle(),
            FlowTurn::Cancelled { .. } => state.reset_to_idle(),
            FlowTurn::NeedMoreInfo { .. } | FlowTurn::Rejected { .. } => {}
        }
    }
}
