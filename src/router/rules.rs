//! 覆写规则表
//!
//! 一张有序、声明式的 (pattern, intent, priority) 表，先于分类器求值：
//! 按 priority 升序扫描（数值小者先查），大小写不敏感子串匹配，首个命中为准。
//! 命中即把分类结果替换为 (intent, 1.0)。

use crate::config::OverrideRuleEntry;

/// 单条覆写规则；pattern 存为小写，输入在路由层已规范化
#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub pattern: String,
    pub intent: String,
    pub priority: u8,
}

impl OverrideRule {
    pub fn new(pattern: &str, intent: &str, priority: u8) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            intent: intent.to_string(),
            priority,
        }
    }
}

/// 规则表：构造时按 priority 排序一次，之后只读
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<OverrideRule>,
}

impl RuleTable {
    pub fn new(mut rules: Vec<OverrideRule>) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    pub fn from_config(entries: &[OverrideRuleEntry]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|e| OverrideRule::new(&e.pattern, &e.intent, e.priority))
                .collect(),
        )
    }

    /// 首个命中的规则
    pub fn matches(&self, text: &str) -> Option<&OverrideRule> {
        self.rules.iter().find(|r| text.contains(r.pattern.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
