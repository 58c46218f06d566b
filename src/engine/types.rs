//! 核心数据类型：话语、意图预测、路由决策、动作结果、引擎回复
//!
//! 每轮输入创建一个 Utterance（规范化后不可变），路由与流程产出派生结果，处理完即丢弃。

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// 未知意图的统一标签（分类器不可用或低置信兜底时使用）
pub const UNKNOWN_INTENT: &str = "unknown";

/// 输入来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Voice,
    Text,
}

/// 单轮用户话语：去首尾空白并小写化，带来源与会话标识
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub source: InputSource,
    pub session_id: String,
}

impl Utterance {
    pub fn new(raw: &str, source: InputSource, session_id: impl Into<String>) -> Self {
        Self {
            text: raw.trim().to_lowercase(),
            source,
            session_id: session_id.into(),
        }
    }

    /// 文本输入的便捷构造
    pub fn text_input(raw: &str, session_id: impl Into<String>) -> Self {
        Self::new(raw, InputSource::Text, session_id)
    }

    /// 生成新的会话标识（单用户场景下每次唤醒/打开窗口一个会话）
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// 分类器输出：标签、[0,1] 置信度、可选实体表
#[derive(Debug, Clone)]
pub struct IntentPrediction {
    pub label: String,
    pub confidence: f32,
    pub entities: HashMap<String, String>,
}

impl IntentPrediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            entities: HashMap::new(),
        }
    }

    /// 分类器缺席/失败时的降级预测：(unknown, 0.0)
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_INTENT, 0.0)
    }
}

/// 路由决策类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    /// 立即执行的动作
    Action,
    /// 会话型回复（寒暄、闲聊）
    Conversational,
    /// 低置信兜底
    LowConfidenceFallback,
    /// 交由活跃流程消费本轮输入
    ContinueFlow,
}

/// 路由决策：最终意图、最终置信度、类别；创建后不再修改
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub intent: String,
    pub confidence: f32,
    pub category: RouteCategory,
    /// 本轮话语包含取消短语且当时有活跃流程：编排器据此先取消流程
    pub cancel_flow: bool,
}

impl RoutingDecision {
    pub fn new(intent: impl Into<String>, confidence: f32, category: RouteCategory) -> Self {
        Self {
            intent: intent.into(),
            confidence,
            category,
            cancel_flow: false,
        }
    }
}

/// 动作执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failure,
    NeedsFollowup,
    Terminate,
}

/// 单次分发的结果：状态、面向用户的回复文本、可选结构化载荷
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub response: String,
    pub payload: Option<Value>,
}

impl ActionResult {
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            response: response.into(),
            payload: None,
        }
    }

    pub fn success_with(response: impl Into<String>, payload: Value) -> Self {
        Self {
            status: ActionStatus::Success,
            response: response.into(),
            payload: Some(payload),
        }
    }

    pub fn failure(response: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failure,
            response: response.into(),
            payload: None,
        }
    }

    pub fn needs_followup(response: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::NeedsFollowup,
            response: response.into(),
            payload: None,
        }
    }
}

/// 引擎对外回复：会话、文本、语言标签与本轮类别（播报/渲染端 fire-and-forget 消费）
#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    pub session_id: String,
    pub text: String,
    pub language: String,
    pub category: RouteCategory,
}

/// 逐轮 worker 的忙闲信号：仅 worker 写，监视器只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// 后台监视器排入的待播通知，由 worker 在空闲轮次投递
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_normalized() {
        let u = Utterance::text_input("  Schedule A Meeting  ", "s1");
        assert_eq!(u.text, "schedule a meeting");
        assert_eq!(u.session_id, "s1");
    }

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(Utterance::new_session_id(), Utterance::new_session_id());
    }

    #[test]
    fn test_prediction_clamped() {
        let p = IntentPrediction::new("greeting", 1.7);
        assert_eq!(p.confidence, 1.0);
        let p = IntentPrediction::unknown();
        assert_eq!(p.label, UNKNOWN_INTENT);
        assert_eq!(p.confidence, 0.0);
    }
}
