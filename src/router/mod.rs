//! 路由层：覆写规则表与置信度路由

pub mod confidence;
pub mod rules;

pub use confidence::{ConfidenceRouter, RouterOptions, FLOW_CANCELLED_INTENT};
pub use rules::{OverrideRule, RuleTable};
