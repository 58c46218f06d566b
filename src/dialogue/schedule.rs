//! 日程流程（流程 A）：收集 {when, subject} 两个槽位后发出结构化日程请求
//!
//! 启动前先过授权探针；追问优先级固定为先 when 后 subject。
//! 时间消解使用注入的参考时钟，默认 Utc::now。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::dialogue::auth::{AuthStatus, AuthorizationProbe};
use crate::dialogue::extract;
use crate::dialogue::state::{FlowStage, FlowState, FlowTurn};
use crate::dialogue::DialogueFlow;
use crate::engine::types::Utterance;

/// 日程流程触发并最终分发的意图
pub const SCHEDULE_INTENT: &str = "schedule_event";

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ScheduleFlow {
    auth: Arc<dyn AuthorizationProbe>,
    clock: Clock,
}

impl ScheduleFlow {
    pub fn new(auth: Arc<dyn AuthorizationProbe>) -> Self {
        Self {
            auth,
            clock: Box::new(Utc::now),
        }
    }

    /// 固定参考时钟（测试用）
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// 单轮抽取：显式标记优先，positional_for 指定允许位置式猜测的槽位
    fn absorb(&self, state: &mut FlowState, text: &str, positional_for: Option<&str>) {
        if state.slot_is_empty("when") {
            if let Some(when) = extract::extract_when(text, (self.clock)()) {
                state.fill("when", when);
            }
        }
        if state.slot_is_empty("subject") {
            if let Some(subject) = extract::extract_subject(text) {
                state.fill("subject", subject);
            }
        }
        // 位置式猜测只对被追问的槽位生效；时间必须是可识别的表达式，不做猜测
        if positional_for == Some("subject") && state.slot_is_empty("subject") {
            if let Some(subject) = extract::positional_subject(text) {
                state.fill("subject", subject);
            }
        }
    }

    /// 抽取后的阶段推进：齐备则就绪，缺槽则（可计数地）追问下一个空槽位
    fn decide(&self, state: &mut FlowState, count_retry: bool) -> FlowTurn {
        match state.first_empty() {
            None => {
                state.stage = FlowStage::ReadyToExecute;
                let payload = json!({
                    "subject": state.slot("subject"),
                    "when": state.slot("when"),
                });
                tracing::info!(?payload, "schedule flow ready to execute");
                FlowTurn::Completed {
                    intent: SCHEDULE_INTENT.to_string(),
                    payload,
                }
            }
            Some(slot) => {
                let slot = slot.to_string();
                if count_retry {
                    state.retries += 1;
                    if state.retries >= state.max_retries {
                        state.stage = FlowStage::Failed;
                        tracing::warn!(retries = state.retries, "schedule flow retries exhausted");
                        return FlowTurn::Failed {
                            response: "Sorry, I still don't have what I need. Let's start over \
                                       whenever you're ready."
                                .to_string(),
                        };
                    }
                }
                let prompt = prompt_for(&slot);
                state.stage = FlowStage::AwaitingSlot(slot);
                state.last_prompt = Some(prompt.clone());
                FlowTurn::NeedMoreInfo { prompt }
            }
        }
    }
}

fn prompt_for(slot: &str) -> String {
    match slot {
        "when" => "When should I schedule it for?".to_string(),
        "subject" => "What is it about?".to_string(),
        other => format!("Could you tell me the {}?", other),
    }
}

#[async_trait]
impl DialogueFlow for ScheduleFlow {
    fn kind(&self) -> &'static str {
        "schedule"
    }

    fn handles(&self, intent: &str) -> bool {
        intent == SCHEDULE_INTENT
    }

    async fn start(&self, state: &mut FlowState, utterance: &Utterance) -> FlowTurn {
        match self.auth.check().await {
            AuthStatus::Authorized => {}
            AuthStatus::Unauthorized => {
                // 前置校验失败：保持 Idle，返回修复提示
                return FlowTurn::Rejected {
                    response: "I'm not authorized to access your calendar. Please grant access \
                               and try again."
                        .to_string(),
                };
            }
            AuthStatus::CredentialsMissing => {
                return FlowTurn::Rejected {
                    response: "Your calendar account isn't set up yet. Please add your \
                               credentials first."
                        .to_string(),
                };
            }
        }

        state.activate(self.kind(), &["when", "subject"]);
        // 触发句本身可能已带槽位值（"schedule a meeting about budget tomorrow at 3pm"）
        self.absorb(state, &utterance.text, None);
        self.decide(state, false)
    }

    async fn advance(&self, state: &mut FlowState, utterance: &Utterance) -> FlowTurn {
        let awaiting = match &state.stage {
            FlowStage::AwaitingSlot(slot) => slot.clone(),
            _ => {
                tracing::warn!(stage = ?state.stage, "schedule flow advanced in unexpected stage");
                return FlowTurn::Rejected {
                    response: "Sorry, something went wrong with that task.".to_string(),
                };
            }
        };
        self.absorb(state, &utterance.text, Some(&awaiting));
        self.decide(state, true)
    }
}
