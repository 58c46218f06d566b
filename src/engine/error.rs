//! 引擎错误类型与安全话术
//!
//! 抽取失败、前置校验失败在流程内就地恢复为追问/提示；后端失败先本地重试再回退；
//! 分类器失败从不向上抛异常。所有终态错误经 user_message 转为安全的用户话术。

use thiserror::Error;

/// 编排引擎可能出现的错误（分类器降级、槽位缺失、前置失败、后端耗尽、能力不可用）
#[derive(Error, Debug)]
pub enum EngineError {
    /// 分类器缺席或调用失败：静默降级为 (unknown, 0.0)，仅记录日志
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// 本轮抽取后仍缺必填槽位：留在 AwaitingSlot 并追问
    #[error("slot extraction incomplete, still missing: {0}")]
    ExtractionIncomplete(String),

    /// 流程前置校验未通过：流程保持 Idle，返回修复提示
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// 单个后端重试耗尽：触发向下一个后端回退
    #[error("backend '{backend}' exhausted {attempts} attempts: {last_error}")]
    RetryExhausted {
        backend: String,
        attempts: u32,
        last_error: String,
    },

    /// 所有后端均耗尽：终态，聚合每个后端的最终错误
    #[error("all backends exhausted: {0}")]
    AllBackendsExhausted(String),

    /// 能力处理器构建失败或不可用：可恢复，转为道歉话术
    #[error("capability unavailable: {0}")]
    HandlerUnavailable(String),
}

impl EngineError {
    /// 终态错误对应的用户话术：永不泄露内部细节
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ClassifierUnavailable(_) | EngineError::ExtractionIncomplete(_) => {
                "Sorry, I didn't catch that. Could you rephrase?".to_string()
            }
            EngineError::PreconditionFailed(hint) => hint.clone(),
            EngineError::RetryExhausted { .. } | EngineError::AllBackendsExhausted(_) => {
                "I couldn't complete that action right now. Please try again later.".to_string()
            }
            EngineError::HandlerUnavailable(_) => {
                "Sorry, that capability isn't available at the moment.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_never_raw() {
        let err = EngineError::AllBackendsExhausted("tcp: connection refused".to_string());
        assert!(!err.user_message().contains("tcp"));
    }

    #[test]
    fn test_precondition_passes_remediation() {
        let err = EngineError::PreconditionFailed("Please sign in to your calendar first.".into());
        assert_eq!(err.user_message(), "Please sign in to your calendar first.");
    }
}
