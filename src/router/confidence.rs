//! 置信度路由
//!
//! 求值顺序（见各步注释）：活跃流程拦截 -> 取消短语 -> 覆写规则 -> 主阈值 ->
//! 会话容差带 -> 自动化关键词兜底 -> 低置信兜底。
//! 分类器失败静默降级为 (unknown, 0.0) 后走同一条路径，最终落在低置信兜底。

use std::collections::HashSet;
use std::sync::Arc;

use crate::classify::IntentClassifier;
use crate::config::AppConfig;
use crate::engine::types::{
    IntentPrediction, RouteCategory, RoutingDecision, Utterance, UNKNOWN_INTENT,
};
use crate::router::rules::RuleTable;

/// 流程取消后的确认意图（取消短语之外无剩余内容时使用）
pub const FLOW_CANCELLED_INTENT: &str = "flow_cancelled";

/// 路由参数：阈值、容差、会话型意图集、自动化关键词、取消短语
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub threshold: f32,
    pub tolerance: f32,
    pub conversational_intents: HashSet<String>,
    /// (keyword, guessed_intent)，按声明顺序扫描
    pub automation_keywords: Vec<(String, String)>,
    pub cancel_phrases: Vec<String>,
}

impl RouterOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            threshold: cfg.router.confidence_threshold,
            tolerance: cfg.router.conversational_tolerance,
            conversational_intents: cfg
                .router
                .conversational_intents
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            automation_keywords: cfg
                .router
                .automation_keywords
                .iter()
                .map(|k| (k.keyword.to_lowercase(), k.intent.clone()))
                .collect(),
            cancel_phrases: cfg
                .dialogue
                .cancel_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 置信度路由器：覆写规则 + 分类器 + 阈值判定
pub struct ConfidenceRouter {
    classifier: Arc<dyn IntentClassifier>,
    rules: RuleTable,
    opts: RouterOptions,
}

impl ConfidenceRouter {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        rules: RuleTable,
        opts: RouterOptions,
    ) -> Self {
        Self {
            classifier,
            rules,
            opts,
        }
    }

    /// 决定一轮话语的去向；flow_active 为该会话是否存在非 Idle 流程
    pub async fn route(&self, utterance: &Utterance, flow_active: bool) -> RoutingDecision {
        let text = utterance.text.as_str();
        let wants_cancel = self.contains_cancel_phrase(text);

        // 步骤 1：活跃流程且非取消 -> 不询问分类器，直接续流（流程自己消费原文，无意图标签）
        if flow_active && !wants_cancel {
            return RoutingDecision::new("", 1.0, RouteCategory::ContinueFlow);
        }

        // 步骤 2：活跃流程遇到取消短语 -> 标记取消，剩余内容继续走 3-6
        if flow_active && wants_cancel {
            let remainder = self.strip_cancel_phrases(text);
            if remainder.is_empty() {
                let mut d =
                    RoutingDecision::new(FLOW_CANCELLED_INTENT, 1.0, RouteCategory::Conversational);
                d.cancel_flow = true;
                return d;
            }
            let mut d = self.classify_route(&remainder).await;
            d.cancel_flow = true;
            return d;
        }

        self.classify_route(text).await
    }

    /// 步骤 3-7：无活跃流程（或取消后的剩余内容）的常规路由
    async fn classify_route(&self, text: &str) -> RoutingDecision {
        // 步骤 3：覆写规则先于分类器，命中即 (intent, 1.0)
        if let Some(rule) = self.rules.matches(text) {
            tracing::debug!(pattern = %rule.pattern, intent = %rule.intent, "override rule hit");
            return self.gate(&rule.intent, 1.0);
        }

        let prediction = match self.classifier.predict(text).await {
            Ok(p) => p,
            Err(e) => {
                // 分类器缺席不抛错：降级预测继续走同样的判定
                tracing::warn!(error = %e, "classifier degraded to (unknown, 0.0)");
                IntentPrediction::unknown()
            }
        };
        let label = prediction.label.as_str();
        let confidence = prediction.confidence;

        // 步骤 4：主阈值（边界取 >=）
        if confidence >= self.opts.threshold {
            return self.gate(label, confidence);
        }

        // 步骤 5：容差带只对会话型意图放行（寒暄允许更低的置信）
        if confidence >= self.opts.threshold - self.opts.tolerance
            && self.opts.conversational_intents.contains(label)
        {
            tracing::debug!(%label, confidence, "accepted within conversational tolerance band");
            return RoutingDecision::new(label, confidence, RouteCategory::Conversational);
        }

        // 步骤 6：自动化关键词兜底，强置 1.0 后按步骤 4 判定
        if let Some((keyword, intent)) = self
            .opts
            .automation_keywords
            .iter()
            .find(|(k, _)| text.contains(k.as_str()))
        {
            tracing::debug!(%keyword, %intent, "automation keyword guess");
            return self.gate(intent, 1.0);
        }

        // 步骤 7：低置信兜底，标签强置 unknown
        tracing::info!(%label, confidence, "low confidence fallback");
        RoutingDecision::new(UNKNOWN_INTENT, confidence, RouteCategory::LowConfidenceFallback)
    }

    /// 达到阈值后的分类：会话型意图归 Conversational，其余归 Action
    fn gate(&self, label: &str, confidence: f32) -> RoutingDecision {
        let category = if self.opts.conversational_intents.contains(label) {
            RouteCategory::Conversational
        } else {
            RouteCategory::Action
        };
        RoutingDecision::new(label, confidence, category)
    }

    pub fn contains_cancel_phrase(&self, text: &str) -> bool {
        self.opts
            .cancel_phrases
            .iter()
            .any(|p| text.contains(p.as_str()))
    }

    /// 去掉所有取消短语后剩余的内容
    fn strip_cancel_phrases(&self, text: &str) -> String {
        let mut rest = text.to_string();
        for phrase in &self.opts.cancel_phrases {
            if let Some(pos) = rest.find(phrase.as_str()) {
                rest.replace_range(pos..pos + phrase.len(), " ");
            }
        }
        rest.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FailingClassifier, MockClassifier};
    use crate::router::rules::OverrideRule;

    fn router(clf: MockClassifier, rules: Vec<OverrideRule>) -> ConfidenceRouter {
        ConfidenceRouter::new(Arc::new(clf), RuleTable::new(rules), RouterOptions::default())
    }

    fn utt(text: &str) -> Utterance {
        Utterance::text_input(text, "s1")
    }

    #[tokio::test]
    async fn test_high_confidence_action() {
        let r = router(MockClassifier::new().with("turn off the lights", "home_control", 0.9), vec![]);
        let d = r.route(&utt("turn off the lights"), false).await;
        assert_eq!(d.category, RouteCategory::Action);
        assert_eq!(d.intent, "home_control");
    }

    #[tokio::test]
    async fn test_threshold_boundary_inclusive() {
        let r = router(MockClassifier::new().with("do the thing", "some_action", 0.5), vec![]);
        let d = r.route(&utt("do the thing"), false).await;
        assert_eq!(d.category, RouteCategory::Action);
    }

    #[tokio::test]
    async fn test_high_confidence_conversational_label() {
        let r = router(MockClassifier::new().with("hello there", "greeting", 0.95), vec![]);
        let d = r.route(&utt("hello there"), false).await;
        assert_eq!(d.category, RouteCategory::Conversational);
    }

    #[tokio::test]
    async fn test_tolerance_band_only_for_conversational() {
        // 0.4 在 [0.35, 0.5) 容差带内：greeting 放行
        let r = router(MockClassifier::new().with("hi", "greeting", 0.4), vec![]);
        let d = r.route(&utt("hi"), false).await;
        assert_eq!(d.category, RouteCategory::Conversational);

        // 同样 0.4 的非会话型意图（无自动化关键词）落入低置信兜底
        let r = router(MockClassifier::new().with("fax the cat", "fax_machine", 0.4), vec![]);
        let d = r.route(&utt("fax the cat"), false).await;
        assert_eq!(d.category, RouteCategory::LowConfidenceFallback);
        assert_eq!(d.intent, UNKNOWN_INTENT);
    }

    #[tokio::test]
    async fn test_override_rule_forces_full_confidence() {
        let r = router(
            MockClassifier::new().with("what's the weather like", "smalltalk", 0.2),
            vec![OverrideRule::new("weather", "weather_query", 0)],
        );
        let d = r.route(&utt("what's the weather like"), false).await;
        assert_eq!(d.intent, "weather_query");
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.category, RouteCategory::Action);
    }

    #[tokio::test]
    async fn test_automation_keyword_guess() {
        // 分类器一无所知，但句子里有 "open"
        let r = router(MockClassifier::new(), vec![]);
        let d = r.route(&utt("open the browser please"), false).await;
        assert_eq!(d.intent, "open_app");
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.category, RouteCategory::Action);
    }

    #[tokio::test]
    async fn test_classifier_failure_degrades() {
        let r = ConfidenceRouter::new(
            Arc::new(FailingClassifier),
            RuleTable::default(),
            RouterOptions::default(),
        );
        let d = r.route(&utt("gibberish with no keywords"), false).await;
        assert_eq!(d.category, RouteCategory::LowConfidenceFallback);
        assert_eq!(d.intent, UNKNOWN_INTENT);
    }

    #[tokio::test]
    async fn test_active_flow_intercepts() {
        let r = router(MockClassifier::new().with("tomorrow", "schedule_event", 0.9), vec![]);
        let d = r.route(&utt("tomorrow at 3pm"), true).await;
        assert_eq!(d.category, RouteCategory::ContinueFlow);
        assert!(!d.cancel_flow);
    }

    #[tokio::test]
    async fn test_cancel_phrase_alone() {
        let r = router(MockClassifier::new(), vec![]);
        let d = r.route(&utt("never mind"), true).await;
        assert!(d.cancel_flow);
        assert_eq!(d.category, RouteCategory::Conversational);
        assert_eq!(d.intent, FLOW_CANCELLED_INTENT);
    }

    #[tokio::test]
    async fn test_cancel_phrase_with_remainder_routes_rest() {
        let r = router(MockClassifier::new().with("hello", "greeting", 0.9), vec![]);
        let d = r.route(&utt("never mind, hello"), true).await;
        assert!(d.cancel_flow);
        assert_eq!(d.category, RouteCategory::Conversational);
        assert_eq!(d.intent, "greeting");
    }

    #[tokio::test]
    async fn test_cancel_phrase_without_flow_is_normal_input() {
        // 无活跃流程时取消短语不是特殊输入
        let r = router(MockClassifier::new(), vec![]);
        let d = r.route(&utt("never mind"), false).await;
        assert_eq!(d.category, RouteCategory::LowConfidenceFallback);
        assert!(!d.cancel_flow);
    }
}
