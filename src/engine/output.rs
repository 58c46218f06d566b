//! 输出投递：最终回复连同语言标签交给播报/渲染端
//!
//! fire-and-forget：引擎不等待播放或渲染完成。

use crate::engine::types::EngineResponse;

/// 输出端 trait：语音合成、终端打印等由调用方实现
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, response: &EngineResponse);
}

/// 默认输出端：写 tracing 日志
#[derive(Debug, Default)]
pub struct TracingSink;

impl ResponseSink for TracingSink {
    fn deliver(&self, response: &EngineResponse) {
        tracing::info!(
            session = %response.session_id,
            language = %response.language,
            category = ?response.category,
            "reply: {}",
            response.text
        );
    }
}
