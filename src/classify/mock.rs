//! Mock 分类器（用于测试与无模型环境）
//!
//! 按剧本返回固定 (标签, 置信度)：先查整句，再查包含关系，否则返回默认预测。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::classify::{ClassifierError, IntentClassifier};
use crate::engine::types::IntentPrediction;

/// 剧本式 Mock：`with("hello", "greeting", 0.9)` 注册样例
#[derive(Default)]
pub struct MockClassifier {
    scripted: HashMap<String, (String, f32)>,
    fallback: Option<(String, f32)>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一条剧本：文本（或其子串）-> (标签, 置信度)
    pub fn with(mut self, text: &str, label: &str, confidence: f32) -> Self {
        self.scripted
            .insert(text.to_lowercase(), (label.to_string(), confidence));
        self
    }

    /// 未命中剧本时的默认预测（缺省为 unknown/0.0）
    pub fn with_fallback(mut self, label: &str, confidence: f32) -> Self {
        self.fallback = Some((label.to_string(), confidence));
        self
    }
}

#[async_trait]
impl IntentClassifier for MockClassifier {
    async fn predict(&self, text: &str) -> Result<IntentPrediction, ClassifierError> {
        let text = text.to_lowercase();
        if let Some((label, conf)) = self.scripted.get(&text) {
            return Ok(IntentPrediction::new(label.clone(), *conf));
        }
        for (needle, (label, conf)) in &self.scripted {
            if text.contains(needle.as_str()) {
                return Ok(IntentPrediction::new(label.clone(), *conf));
            }
        }
        Ok(match &self.fallback {
            Some((label, conf)) => IntentPrediction::new(label.clone(), *conf),
            None => IntentPrediction::unknown(),
        })
    }
}

/// 恒定失败的分类器：用于验证路由层的静默降级
#[derive(Debug, Default)]
pub struct FailingClassifier;

#[async_trait]
impl IntentClassifier for FailingClassifier {
    async fn predict(&self, _text: &str) -> Result<IntentPrediction, ClassifierError> {
        Err(ClassifierError::Unavailable("model not loaded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_match() {
        let clf = MockClassifier::new().with("hello", "greeting", 0.9);
        let p = clf.predict("hello").await.unwrap();
        assert_eq!(p.label, "greeting");
        assert_eq!(p.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_substring_match() {
        let clf = MockClassifier::new().with("schedule", "schedule_event", 0.8);
        let p = clf.predict("schedule a meeting").await.unwrap();
        assert_eq!(p.label, "schedule_event");
    }

    #[tokio::test]
    async fn test_unscripted_is_unknown() {
        let clf = MockClassifier::new();
        let p = clf.predict("xyzzy").await.unwrap();
        assert_eq!(p.label, "unknown");
        assert_eq!(p.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_failing_classifier() {
        let clf = FailingClassifier;
        assert!(clf.predict("hello").await.is_err());
    }
}
