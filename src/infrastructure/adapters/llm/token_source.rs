//! Token Sources - 上游文本增量适配器
//!
//! - `ChannelTokenSource`: 从 mpsc 通道读取（LLM 客户端在另一个任务中推送）
//! - `StreamTokenSource`: 包装任意 `Stream`

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::application::ports::{SourceError, TokenSourcePort, UpstreamEvent};
use crate::domain::TokenDelta;

/// 基于 mpsc 通道的 source；发送端在 EndOfTurn 之前被丢弃视为断开
pub struct ChannelTokenSource {
    receiver: mpsc::Receiver<UpstreamEvent>,
}

impl ChannelTokenSource {
    pub fn new(receiver: mpsc::Receiver<UpstreamEvent>) -> Self {
        Self { receiver }
    }

    /// 创建一对 (发送端, source)
    pub fn channel(capacity: usize) -> (mpsc::Sender<UpstreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TokenSourcePort for ChannelTokenSource {
    async fn next_event(&mut self) -> Result<UpstreamEvent, SourceError> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| SourceError::Disconnected("channel closed".to_string()))
    }

    async fn cancel(&mut self) {
        // 关闭接收端，发送方的下一次 send 会失败，从而停止生成
        self.receiver.close();
    }
}

/// 包装 `Stream<Item = Result<UpstreamEvent, SourceError>>`
pub struct StreamTokenSource<S> {
    stream: Option<S>,
}

impl<S> StreamTokenSource<S>
where
    S: Stream<Item = Result<UpstreamEvent, SourceError>> + Send + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

type FragmentStream = stream::Iter<std::vec::IntoIter<Result<UpstreamEvent, SourceError>>>;

impl StreamTokenSource<FragmentStream> {
    /// 由一组 fragment 构造，末尾附加 EndOfTurn
    pub fn from_fragments<I, T>(fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let events: Vec<Result<UpstreamEvent, SourceError>> = fragments
            .into_iter()
            .map(|f| Ok(UpstreamEvent::Delta(TokenDelta::new(f))))
            .chain(std::iter::once(Ok(UpstreamEvent::EndOfTurn)))
            .collect();
        Self::new(stream::iter(events))
    }
}

#[async_trait]
impl<S> TokenSourcePort for StreamTokenSource<S>
where
    S: Stream<Item = Result<UpstreamEvent, SourceError>> + Send + Unpin,
{
    async fn next_event(&mut self) -> Result<UpstreamEvent, SourceError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(SourceError::Disconnected("stream cancelled".to_string()));
        };
        match stream.next().await {
            Some(event) => event,
            None => Err(SourceError::Disconnected("stream ended".to_string())),
        }
    }

    async fn cancel(&mut self) {
        // 丢弃底层 stream（例如 HTTP 响应体），上游随之停止
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_disconnect() {
        let (tx, mut source) = ChannelTokenSource::channel(4);
        tx.send(UpstreamEvent::Delta(TokenDelta::from("hi"))).await.unwrap();
        drop(tx);

        assert_eq!(
            source.next_event().await.unwrap(),
            UpstreamEvent::Delta(TokenDelta::from("hi"))
        );
        assert!(matches!(
            source.next_event().await,
            Err(SourceError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn test_channel_cancel_stops_sender() {
        let (tx, mut source) = ChannelTokenSource::channel(4);
        source.cancel().await;
        assert!(tx.send(UpstreamEvent::EndOfTurn).await.is_err());
    }

    #[tokio::test]
    async fn test_fragments_end_with_end_of_turn() {
        let mut source = StreamTokenSource::from_fragments(["a", "b"]);
        assert_eq!(
            source.next_event().await.unwrap(),
            UpstreamEvent::Delta(TokenDelta::from("a"))
        );
        source.next_event().await.unwrap();
        assert_eq!(source.next_event().await.unwrap(), UpstreamEvent::EndOfTurn);
        assert!(source.next_event().await.is_err());

        source.cancel().await;
        assert!(source.next_event().await.is_err());
    }
}
