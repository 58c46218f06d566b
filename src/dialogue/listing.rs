//! 列表消解流程（流程 B）：对最近展示的有序列表消解一条引用并发出删除动作
//!
//! 非槽位填充：接受序数词、数字或标题子串（首个命中为准）。
//! 没有展示过列表时不启动，提示用户先请求列表。

use async_trait::async_trait;
use serde_json::json;

use crate::dialogue::extract::resolve_reference;
use crate::dialogue::state::{FlowStage, FlowState, FlowTurn};
use crate::dialogue::DialogueFlow;
use crate::engine::types::Utterance;

/// 删除动作最终分发的意图
pub const REMOVE_INTENT: &str = "reminder_remove";

#[derive(Debug, Default)]
pub struct ListingFlow;

impl ListingFlow {
    pub fn new() -> Self {
        Self
    }

    /// 引用命中 -> 就绪并携带被删条目的标识
    fn complete(&self, state: &mut FlowState, idx: usize) -> FlowTurn {
        let item = state.listed_items[idx].clone();
        state.stage = FlowStage::ReadyToExecute;
        tracing::info!(index = idx, id = %item.id, "listing reference resolved");
        FlowTurn::Completed {
            intent: REMOVE_INTENT.to_string(),
            payload: json!({ "id": item.id, "title": item.title }),
        }
    }
}

#[async_trait]
impl DialogueFlow for ListingFlow {
    fn kind(&self) -> &'static str {
        "reminder"
    }

    fn handles(&self, intent: &str) -> bool {
        intent == REMOVE_INTENT
    }

    async fn start(&self, state: &mut FlowState, utterance: &Utterance) -> FlowTurn {
        if state.listed_items.is_empty() {
            // 前序动作缺失：保持 Idle
            return FlowTurn::Rejected {
                response: "I haven't shown you a list yet. Ask me to list your reminders first."
                    .to_string(),
            };
        }

        if let Some(idx) = resolve_reference(&utterance.text, &state.listed_items) {
            state.activate(self.kind(), &["reference"]);
            return self.complete(state, idx);
        }

        // 引用不明确：进入单槽位澄清
        state.activate(self.kind(), &["reference"]);
        let prompt =
            "Which one should I remove? Say its number or part of its title.".to_string();
        state.stage = FlowStage::AwaitingSlot("reference".to_string());
        state.last_prompt = Some(prompt.clone());
        FlowTurn::NeedMoreInfo { prompt }
    }

    async fn advance(&self, state: &mut FlowState, utterance: &Utterance) -> FlowTurn {
        if let Some(idx) = resolve_reference(&utterance.text, &state.listed_items) {
            return self.complete(state, idx);
        }

        state.retries += 1;
        if state.retries >= state.max_retries {
            state.stage = FlowStage::Failed;
            tracing::warn!(retries = state.retries, "listing flow retries exhausted");
            return FlowTurn::Failed {
                response: "Sorry, I couldn't figure out which one you meant.".to_string(),
            };
        }
        let prompt = "Sorry, which one? You can say something like 'the second one'.".to_string();
        state.last_prompt = Some(prompt.clone());
        FlowTurn::NeedMoreInfo { prompt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::state::ListedItem;

    fn state_with_items() -> FlowState {
        let mut st = FlowState::new(4);
        st.listed_items = vec![
            ListedItem { id: "r1".into(), title: "Buy groceries".into() },
            ListedItem { id: "r2".into(), title: "Dentist appointment".into() },
            ListedItem { id: "r3".into(), title: "Call mom".into() },
        ];
        st
    }

    fn utt(text: &str) -> Utterance {
        Utterance::text_input(text, "s1")
    }

    #[tokio::test]
    async fn test_no_list_shown_yet() {
        let f = ListingFlow::new();
        let mut st = FlowState::new(4);
        let turn = f.start(&mut st, &utt("remove the second one")).await;
        match turn {
            FlowTurn::Rejected { response } => assert!(response.contains("list")),
            other => panic!("unexpected turn: {:?}", other),
        }
        assert!(!st.is_active());
    }

    #[tokio::test]
    async fn test_second_one_resolves_to_index_1() {
        let f = ListingFlow::new();
        let mut st = state_with_items();
        let turn = f.start(&mut st, &utt("remove the second one")).await;
        match turn {
            FlowTurn::Completed { intent, payload } => {
                assert_eq!(intent, REMOVE_INTENT);
                assert_eq!(payload["id"], "r2");
            }
            other => panic!("unexpected turn: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_title_substring_first_match() {
        let f = ListingFlow::new();
        let mut st = state_with_items();
        let turn = f.start(&mut st, &utt("delete the groceries one")).await;
        match turn {
            FlowTurn::Completed { payload, .. } => assert_eq!(payload["id"], "r1"),
            other => panic!("unexpected turn: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ambiguous_reference_then_clarified() {
        let f = ListingFlow::new();
        let mut st = state_with_items();
        let turn = f.start(&mut st, &utt("remove that")).await;
        assert!(matches!(turn, FlowTurn::NeedMoreInfo { .. }));
        assert_eq!(st.stage, FlowStage::AwaitingSlot("reference".to_string()));

        let turn = f.advance(&mut st, &utt("the third one")).await;
        match turn {
            FlowTurn::Completed { payload, .. } => assert_eq!(payload["id"], "r3"),
            other => panic!("unexpected turn: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clarification_retries_bounded() {
        let f = ListingFlow::new();
        let mut st = state_with_items();
        f.start(&mut st, &utt("remove that")).await;
        for _ in 1..=3u32 {
            let turn = f.advance(&mut st, &utt("whatever you think")).await;
            assert!(matches!(turn, FlowTurn::NeedMoreInfo { .. }));
        }
        let turn = f.advance(&mut st, &utt("whatever you think")).await;
        assert!(matches!(turn, FlowTurn::Failed { .. }));
    }
}
