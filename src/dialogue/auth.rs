//! 授权探针（日程流程的前置校验）
//!
//! 真实实现由调用方注入（如日历账号的 OAuth 状态）；本 crate 只消费三态结果。

use async_trait::async_trait;

/// 授权状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Authorized,
    Unauthorized,
    CredentialsMissing,
}

/// 授权探针 trait
#[async_trait]
pub trait AuthorizationProbe: Send + Sync {
    async fn check(&self) -> AuthStatus;
}

/// 恒通过的默认探针
#[derive(Debug, Default)]
pub struct AlwaysAuthorized;

#[async_trait]
impl AuthorizationProbe for AlwaysAuthorized {
    async fn check(&self) -> AuthStatus {
        AuthStatus::Authorized
    }
}

/// 固定返回某个状态的探针（测试用）
#[derive(Debug)]
pub struct StaticProbe(pub AuthStatus);

#[async_trait]
impl AuthorizationProbe for StaticProbe {
    async fn check(&self) -> AuthStatus {
        self.0
    }
}
