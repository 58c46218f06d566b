//! 意图分类器抽象
//!
//! 真实的统计分类器由调用方注入；本 crate 只消费 predict 结果。
//! 固定模型快照下 predict 应是确定性的；失败由路由层降级为 (unknown, 0.0)，从不上抛。

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::types::IntentPrediction;

/// 分类器调用错误
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("classifier failed: {0}")]
    Failed(String),
}

/// 意图分类器 trait：文本 -> (标签, 置信度, 实体)
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn predict(&self, text: &str) -> Result<IntentPrediction, ClassifierError>;
}
