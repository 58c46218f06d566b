//! 可观测性：tracing 初始化
//!
//! 库本身只打点不初始化；调用方（或测试）在入口处调用一次 `init`。
//! `RUST_LOG` 可覆盖默认的 info 级别。

use tracing_subscriber::EnvFilter;

pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
