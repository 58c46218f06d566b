//! 会话流程状态：阶段、槽位表、重试计数与最近展示列表
//!
//! 阶段机：Idle -> AwaitingSlot(slot) -> ReadyToExecute -> Idle；
//! Cancelled / Failed 可从任意 AwaitingSlot 到达，均立即复位为 Idle。

use serde::Serialize;
use serde_json::Value;

/// 流程阶段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    Idle,
    /// 正在等待某个具名槽位
    AwaitingSlot(String),
    ReadyToExecute,
    Cancelled,
    Failed,
}

/// 具名槽位；按声明顺序即追问优先级
#[derive(Debug, Clone)]
pub struct Slot {
    pub name: String,
    pub value: Option<String>,
}

/// 列表消解流程展示过的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedItem {
    pub id: String,
    pub title: String,
}

/// 每会话的流程状态（同一会话至多一个非 Idle 实例）
#[derive(Debug, Clone)]
pub struct FlowState {
    /// 活跃流程的类型名；Idle 时为 None
    pub flow_kind: Option<String>,
    pub stage: FlowStage,
    /// 槽位表，声明顺序即固定追问优先级
    pub slots: Vec<Slot>,
    pub retries: u32,
    pub max_retries: u32,
    /// 最近一次向用户发出的追问
    pub last_prompt: Option<String>,
    /// 最近展示的有序列表；复位流程时保留（属于会话，不属于单个流程）
    pub listed_items: Vec<ListedItem>,
}

impl FlowState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            flow_kind: None,
            stage: FlowStage::Idle,
            slots: Vec::new(),
            retries: 0,
            max_retries,
            last_prompt: None,
            listed_items: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage != FlowStage::Idle
    }

    /// 激活流程并声明槽位（按追问优先级排列）
    pub fn activate(&mut self, kind: &str, slot_names: &[&str]) {
        self.flow_kind = Some(kind.to_string());
        self.slots = slot_names
            .iter()
            .map(|n| Slot {
                name: n.to_string(),
                value: None,
            })
            .collect();
        self.retries = 0;
    }

    /// 填充槽位；已填的槽位不被覆盖。返回是否实际写入
    pub fn fill(&mut self, name: &str, value: impl Into<String>) -> bool {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.name == name) {
            if slot.value.is_none() {
                slot.value = Some(value.into());
                return true;
            }
        }
        false
    }

    pub fn slot(&self, name: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.value.as_deref())
    }

    pub fn slot_is_empty(&self, name: &str) -> bool {
        self.slot(name).is_none()
    }

    /// 按优先级返回第一个空槽位
    pub fn first_empty(&self) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.value.is_none())
            .map(|s| s.name.as_str())
    }

    pub fn all_filled(&self) -> bool {
        self.slots.iter().all(|s| s.value.is_some())
    }

    /// 复位为 Idle；listed_items 属于会话，保留
    pub fn reset_to_idle(&mut self) {
        self.flow_kind = None;
        self.stage = FlowStage::Idle;
        self.slots.clear();
        self.retries = 0;
        self.last_prompt = None;
    }
}

/// 流程单轮结果（显式标签，替代异常式控制流）
#[derive(Debug, Clone)]
pub enum FlowTurn {
    /// 仍缺槽位：带下一条追问
    NeedMoreInfo { prompt: String },
    /// 槽位齐备：携带最终意图与载荷，交给分发器
    Completed { intent: String, payload: Value },
    /// 用户取消
    Cancelled { response: String },
    /// 重试耗尽
    Failed { response: String },
    /// 未能启动（前置校验失败 / 已有活跃流程 / 缺少前序动作），会话保持原状
    Rejected { response: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_never_overwrites() {
        let mut st = FlowState::new(4);
        st.activate("schedule", &["when", "subject"]);
        assert!(st.fill("when", "tomorrow"));
        assert!(!st.fill("when", "today"));
        assert_eq!(st.slot("when"), Some("tomorrow"));
    }

    #[test]
    fn test_first_empty_follows_priority() {
        let mut st = FlowState::new(4);
        st.activate("schedule", &["when", "subject"]);
        assert_eq!(st.first_empty(), Some("when"));
        st.fill("when", "tomorrow");
        assert_eq!(st.first_empty(), Some("subject"));
        st.fill("subject", "standup");
        assert!(st.all_filled());
    }

    #[test]
    fn test_reset_keeps_listed_items() {
        let mut st = FlowState::new(4);
        st.listed_items.push(ListedItem {
            id: "r1".into(),
            title: "dentist".into(),
        });
        st.activate("reminder", &["reference"]);
        st.stage = FlowStage::AwaitingSlot("reference".into());
        st.reset_to_idle();
        assert_eq!(st.stage, FlowStage::Idle);
        assert!(st.flow_kind.is_none());
        assert_eq!(st.listed_items.len(), 1);
    }
}
