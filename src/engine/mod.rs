//! 引擎层：编排、状态监视、输出投递、错误类型与核心数据类型

pub mod error;
pub mod monitor;
pub mod orchestrator;
pub mod output;
pub mod types;

pub use error::EngineError;
pub use monitor::{StatusMonitor, StatusProbe};
pub use orchestrator::{spawn_engine, Command, Engine, EngineHandle};
pub use output::{ResponseSink, TracingSink};
pub use types::{EngineResponse, Notification, WorkerStatus};
