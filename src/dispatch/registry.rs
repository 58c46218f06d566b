//! 能力注册表
//!
//! 能力实现 CapabilityHandler trait（name / available / handle），按工厂懒构建并缓存；
//! 注册表在构造时显式传入编排引擎，不走任何全局单例。意图 -> 能力名的映射也在这里维护。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::engine::types::ActionResult;

/// 能力构建 / 可用性错误
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("capability build failed: {0}")]
    BuildFailed(String),
}

/// 能力处理器 trait：单一 handle 入口，外加显式可用性探针
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// 能力名（注册表键）
    fn name(&self) -> &str;

    /// 分发前的可用性探针；默认可用
    fn available(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// 执行动作；永不 panic，失败以 ActionResult::failure 表达
    async fn handle(&self, intent: &str, payload: &Value) -> ActionResult;
}

/// 能力工厂：首次用到时构建处理器，构建失败由分发器兜底
pub type HandlerFactory =
    Box<dyn Fn() -> Result<Arc<dyn CapabilityHandler>, HandlerError> + Send + Sync>;

/// 能力注册表：工厂表 + 实例缓存 + 意图映射
#[derive(Default)]
pub struct CapabilityRegistry {
    factories: HashMap<String, HandlerFactory>,
    cache: HashMap<String, Arc<dyn CapabilityHandler>>,
    intents: HashMap<String, String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册懒构建工厂
    pub fn register_factory(
        &mut self,
        capability: &str,
        factory: impl Fn() -> Result<Arc<dyn CapabilityHandler>, HandlerError> + Send + Sync + 'static,
    ) {
        self.factories
            .insert(capability.to_string(), Box::new(factory));
    }

    /// 注册已构建实例（等价于恒成功的工厂）
    pub fn register(&mut self, handler: impl CapabilityHandler + 'static) {
        let handler: Arc<dyn CapabilityHandler> = Arc::new(handler);
        self.cache.insert(handler.name().to_string(), handler);
    }

    /// 声明某意图由某能力处理
    pub fn map_intent(&mut self, intent: &str, capability: &str) {
        self.intents
            .insert(intent.to_string(), capability.to_string());
    }

    /// 查询意图归属的能力名
    pub fn capability_for(&self, intent: &str) -> Option<&str> {
        self.intents.get(intent).map(String::as_str)
    }

    /// 取缓存的实例，必要时经工厂懒构建并缓存
    pub fn get_or_build(
        &mut self,
        capability: &str,
    ) -> Result<Arc<dyn CapabilityHandler>, HandlerError> {
        if let Some(handler) = self.cache.get(capability) {
            return Ok(handler.clone());
        }
        let factory = self
            .factories
            .get(capability)
            .ok_or_else(|| HandlerError::Unavailable(capability.to_string()))?;
        let handler = factory()?;
        self.cache
            .insert(capability.to_string(), handler.clone());
        Ok(handler)
    }

    pub fn capability_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cache
            .keys()
            .chain(self.factories.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoCapability;

    #[async_trait]
    impl CapabilityHandler for EchoCapability {
        fn name(&self) -> &str {
            "echo"
        }

        async fn handle(&self, intent: &str, _payload: &Value) -> ActionResult {
            ActionResult::success(format!("echo: {}", intent))
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut reg = CapabilityRegistry::new();
        reg.register(EchoCapability);
        reg.map_intent("say_hello", "echo");

        assert_eq!(reg.capability_for("say_hello"), Some("echo"));
        let handler = reg.get_or_build("echo").unwrap();
        let result = handler.handle("say_hello", &Value::Null).await;
        assert_eq!(result.response, "echo: say_hello");
    }

    #[test]
    fn test_factory_built_once_and_cached() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        let mut reg = CapabilityRegistry::new();
        reg.register_factory("echo", || {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EchoCapability) as Arc<dyn CapabilityHandler>)
        });

        reg.get_or_build("echo").unwrap();
        reg.get_or_build("echo").unwrap();
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_build_failure_is_error_not_panic() {
        let mut reg = CapabilityRegistry::new();
        reg.register_factory("broken", || {
            Err(HandlerError::BuildFailed("missing binary".to_string()))
        });
        assert!(reg.get_or_build("broken").is_err());
        // 失败不缓存：下次仍会尝试构建
        assert!(reg.get_or_build("broken").is_err());
    }

    #[test]
    fn test_unknown_capability() {
        let mut reg = CapabilityRegistry::new();
        assert!(matches!(
            reg.get_or_build("nope"),
            Err(HandlerError::Unavailable(_))
        ));
    }
}
