//! 后台状态监视器
//!
//! 独立长驻任务：按周期探测，只读 worker 的忙闲信号，把待播通知排入队列；
//! 信号与会话状态只由逐轮 worker 写（单写多读）。

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::types::{Notification, WorkerStatus};

/// 探测函数：每个周期调用一次，返回 Some 时产生一条通知
pub type StatusProbe = Box<dyn Fn() -> Option<Notification> + Send>;

pub struct StatusMonitor {
    status: watch::Receiver<WorkerStatus>,
    notify: mpsc::UnboundedSender<Notification>,
    period: Duration,
    probe: StatusProbe,
}

impl StatusMonitor {
    pub fn new(
        status: watch::Receiver<WorkerStatus>,
        notify: mpsc::UnboundedSender<Notification>,
        period: Duration,
        probe: StatusProbe,
    ) -> Self {
        Self {
            status,
            notify,
            period,
            probe,
        }
    }

    /// 启动监视循环；shutdown 触发时退出
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        // worker 忙时跳过本轮探测
                        if *self.status.borrow() != WorkerStatus::Idle {
                            continue;
                        }
                        if let Some(note) = (self.probe)() {
                            tracing::debug!(text = %note.text, "monitor enqueued notification");
                            if self.notify.send(note).is_err() {
                                break; // 引擎已退出
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_monitor_fires_when_idle() {
        let (_status_tx, status_rx) = watch::channel(WorkerStatus::Idle);
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();

        let monitor = StatusMonitor::new(
            status_rx,
            notify_tx,
            Duration::from_millis(5),
            Box::new(move || {
                if fired2.swap(true, Ordering::SeqCst) {
                    None
                } else {
                    Some(Notification { text: "battery low".to_string() })
                }
            }),
        );
        let shutdown = CancellationToken::new();
        let handle = monitor.spawn(shutdown.clone());

        let note = tokio::time::timeout(Duration::from_secs(1), notify_rx.recv())
            .await
            .expect("monitor should fire")
            .unwrap();
        assert_eq!(note.text, "battery low");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_monitor_skips_while_busy() {
        let (_status_tx, status_rx) = watch::channel(WorkerStatus::Busy);
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        let monitor = StatusMonitor::new(
            status_rx,
            notify_tx,
            Duration::from_millis(5),
            Box::new(|| Some(Notification { text: "ping".to_string() })),
        );
        let shutdown = CancellationToken::new();
        let handle = monitor.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(notify_rx.try_recv().is_err());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
