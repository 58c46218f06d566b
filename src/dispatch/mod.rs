//! 分发层：能力注册表、动作分发与多后端回退执行

pub mod dispatcher;
pub mod fallback;
pub mod registry;

pub use dispatcher::ActionDispatcher;
pub use fallback::{
    ActionBackend, BackendAttempt, BackendError, ExecutionReport, FallbackCapability,
    FallbackExecutor, RetryPolicy,
};
pub use registry::{CapabilityHandler, CapabilityRegistry, HandlerError, HandlerFactory};
