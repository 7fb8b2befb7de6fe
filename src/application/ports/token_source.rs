//! Token Source Port - LLM 文本增量来源

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TokenDelta;

#[derive(Debug, Error)]
pub enum SourceError {
    /// 在 end-of-turn 之前断开
    #[error("Source disconnected: {0}")]
    Disconnected(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// 上游事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    Delta(TokenDelta),
    /// 显式的回复结束信号
    EndOfTurn,
}

/// Token Source Port
///
/// 流水线独占一个 source，按顺序拉取事件
#[async_trait]
pub trait TokenSourcePort: Send {
    /// 下一个事件；返回错误表示上游已不可用
    async fn next_event(&mut self) -> Result<UpstreamEvent, SourceError>;

    /// Turn 被取消时调用，通知上游停止生成
    async fn cancel(&mut self);
}
