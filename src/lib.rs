//! Iris - Rust 个人助理命令编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **classify**: 外部意图分类器抽象（predict）与 Mock 实现
//! - **router**: 置信度路由（覆写规则表、阈值、会话容差带、关键词兜底）
//! - **dialogue**: 多轮槽位对话（日程流、列表引用消解流）与会话状态机
//! - **dispatch**: 能力分发（懒加载注册表）与多后端回退执行器
//! - **engine**: 编排器（逐轮 worker）、状态监视、输出投递、错误类型
//! - **observability**: tracing 初始化（由调用方在入口处调用）
//!
//! 本 crate 是纯库：语音采集、界面渲染与真实能力实现均由调用方注入。

pub mod classify;
pub mod config;
pub mod dialogue;
pub mod dispatch;
pub mod engine;
pub mod observability;
pub mod router;

pub use engine::{
    spawn_engine, Command, Engine, EngineError, EngineHandle, EngineResponse, Notification,
    ResponseSink, StatusMonitor, StatusProbe, TracingSink, WorkerStatus,
};
pub use engine::types::{
    ActionResult, ActionStatus, InputSource, IntentPrediction, RouteCategory, RoutingDecision,
    Utterance,
};
