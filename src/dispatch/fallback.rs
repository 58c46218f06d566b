//! 多后端回退执行器
//!
//! 同一动作可有多个可互换的后端策略。对当前后端做有界重试（指数退避，等待发生在
//! 执行该动作的 worker 上），耗尽后切换下一个后端；首个成功的后端成为本会话的
//! 粘性首选。全部耗尽则聚合每个后端的最终错误返回。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ExecutorSection;
use crate::dispatch::registry::CapabilityHandler;
use crate::engine::types::{ActionResult, ActionStatus};
use crate::engine::EngineError;

/// 后端执行错误
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// 单个后端策略：同一效果的一种具体达成方式
#[async_trait]
pub trait ActionBackend: Send + Sync {
    fn id(&self) -> &str;

    async fn execute(&self, params: &Value) -> Result<String, BackendError>;
}

/// 重试策略：单后端尝试上限与退避参数
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 单后端最大尝试次数；1 表示只试一次不重试
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ExecutorSection) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            backoff_multiplier: cfg.backoff_multiplier,
        }
    }

    /// 第 attempt 次尝试（1 起始）之前的等待：base × multiplier^(attempt-2)
    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay
            .mul_f64(self.backoff_multiplier.powi(attempt as i32 - 2))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutorSection::default())
    }
}

/// 一次尝试的记录：仅在单次执行期间累积，随报告返回后丢弃
#[derive(Debug, Clone)]
pub struct BackendAttempt {
    pub backend: String,
    /// 该后端内的尝试序号（1 起始）
    pub attempt: u32,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// 执行报告：最终状态、用户话术与全部尝试明细
#[derive(Debug)]
pub struct ExecutionReport {
    pub status: ActionStatus,
    pub response: String,
    pub attempts: Vec<BackendAttempt>,
    /// 成功时的后端 id
    pub succeeded_backend: Option<String>,
    /// 全部耗尽时的聚合错误摘要（仅日志/调试用，不直接给用户）
    pub error_summary: Option<String>,
}

/// 回退执行器：有序后端列表 + 重试策略 + 粘性首选
pub struct FallbackExecutor {
    backends: Vec<Arc<dyn ActionBackend>>,
    policy: RetryPolicy,
    allow_fallback: bool,
    /// 上次成功的后端下标；后续调用从它开始
    preferred: AtomicUsize,
}

impl FallbackExecutor {
    pub fn new(backends: Vec<Arc<dyn ActionBackend>>, policy: RetryPolicy) -> Self {
        Self {
            backends,
            policy,
            allow_fallback: true,
            preferred: AtomicUsize::new(0),
        }
    }

    pub fn with_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    /// 当前首选后端的 id
    pub fn preferred_backend(&self) -> Option<&str> {
        self.backends
            .get(self.preferred.load(Ordering::Relaxed))
            .map(|b| b.id())
    }

    /// 首选在前，其余按声明顺序
    fn candidate_order(&self) -> Vec<usize> {
        let preferred = self.preferred.load(Ordering::Relaxed);
        let mut order: Vec<usize> = (0..self.backends.len()).collect();
        if preferred < self.backends.len() {
            order.retain(|&i| i != preferred);
            order.insert(0, preferred);
        }
        if !self.allow_fallback {
            order.truncate(1);
        }
        order
    }

    pub async fn execute(&self, params: &Value) -> ExecutionReport {
        let mut attempts: Vec<BackendAttempt> = Vec::new();
        let mut final_errors: Vec<(String, String)> = Vec::new();

        for idx in self.candidate_order() {
            let backend = &self.backends[idx];
            let mut last_error = String::new();

            for attempt in 1..=self.policy.max_attempts {
                if attempt > 1 {
                    // 退避等待只阻塞执行动作的 worker，不影响输入侧
                    tokio::time::sleep(self.policy.delay_before(attempt)).await;
                }
                match backend.execute(params).await {
                    Ok(response) => {
                        attempts.push(BackendAttempt {
                            backend: backend.id().to_string(),
                            attempt,
                            error: None,
                            at: Utc::now(),
                        });
                        // 粘性首选：本次成功者优先用于后续调用
                        self.preferred.store(idx, Ordering::Relaxed);
                        tracing::info!(backend = backend.id(), attempt, "backend succeeded");
                        return ExecutionReport {
                            status: ActionStatus::Success,
                            response,
                            attempts,
                            succeeded_backend: Some(backend.id().to_string()),
                            error_summary: None,
                        };
                    }
                    Err(e) => {
                        last_error = e.to_string();
                        tracing::warn!(
                            backend = backend.id(),
                            attempt,
                            error = %last_error,
                            "backend attempt failed"
                        );
                        attempts.push(BackendAttempt {
                            backend: backend.id().to_string(),
                            attempt,
                            error: Some(last_error.clone()),
                            at: Utc::now(),
                        });
                    }
                }
            }

            let exhausted = EngineError::RetryExhausted {
                backend: backend.id().to_string(),
                attempts: self.policy.max_attempts,
                last_error: last_error.clone(),
            };
            tracing::warn!(error = %exhausted, "falling over to next backend");
            final_errors.push((backend.id().to_string(), last_error));
        }

        let summary = final_errors
            .iter()
            .map(|(id, err)| format!("{}: {}", id, err))
            .collect::<Vec<_>>()
            .join("; ");
        let err = EngineError::AllBackendsExhausted(summary.clone());
        tracing::error!(error = %err, "action failed on every backend");
        ExecutionReport {
            status: ActionStatus::Failure,
            response: err.user_message(),
            attempts,
            succeeded_backend: None,
            error_summary: Some(summary),
        }
    }
}

/// 把回退执行器包装成一个能力处理器，供分发器直接调用
pub struct FallbackCapability {
    name: String,
    executor: FallbackExecutor,
}

impl FallbackCapability {
    pub fn new(name: &str, executor: FallbackExecutor) -> Self {
        Self {
            name: name.to_string(),
            executor,
        }
    }
}

#[async_trait]
impl CapabilityHandler for FallbackCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _intent: &str, payload: &Value) -> ActionResult {
        let report = self.executor.execute(payload).await;
        match report.status {
            ActionStatus::Success => ActionResult::success_with(
                report.response,
                json!({
                    "backend": report.succeeded_backend,
                    "attempts": report.attempts.len(),
                }),
            ),
            _ => ActionResult::failure(report.response),
        }
    }
}
