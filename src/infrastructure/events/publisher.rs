//! Event Publisher Implementation
//!
//! 按连接推送输出消息。每个连接一个有界 mpsc 通道，
//! 保证消息顺序，并在客户端消费过慢时形成背压。

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::ports::{OutputMessage, OutputSinkPort, SinkError};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// 事件发布器
pub struct EventPublisher {
    /// connection_id -> sender
    connections: DashMap<String, mpsc::Sender<OutputMessage>>,
    capacity: usize,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 注册连接，返回消息接收端；重复注册会替换旧通道
    pub fn register(&self, connection_id: &str) -> mpsc::Receiver<OutputMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self
            .connections
            .insert(connection_id.to_string(), tx)
            .is_some()
        {
            tracing::debug!(connection_id = %connection_id, "Connection re-registered");
        }
        rx
    }

    /// 取消注册连接
    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn is_registered(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 连接对应的输出端
    pub fn sink_for(self: &Arc<Self>, connection_id: &str) -> ConnectionSink {
        ConnectionSink {
            publisher: Arc::clone(self),
            connection_id: connection_id.to_string(),
        }
    }

    /// 发布消息到指定连接
    pub async fn publish(&self, connection_id: &str, message: OutputMessage) -> Result<(), SinkError> {
        // 先克隆 sender，避免跨 await 持有 DashMap 的锁
        let sender = self
            .connections
            .get(connection_id)
            .map(|s| s.clone())
            .ok_or_else(|| SinkError::ConnectionNotFound(connection_id.to_string()))?;

        sender.send(message).await.map_err(|e| {
            tracing::debug!(
                connection_id = %connection_id,
                turn_id = %e.0.turn_id(),
                "Failed to publish message (receiver dropped)"
            );
            SinkError::Closed(connection_id.to_string())
        })
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// 绑定到单个连接的输出端
#[derive(Clone)]
pub struct ConnectionSink {
    publisher: Arc<EventPublisher>,
    connection_id: String,
}

impl ConnectionSink {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }
}

#[async_trait]
impl OutputSinkPort for ConnectionSink {
    async fn send(&self, message: OutputMessage) -> Result<(), SinkError> {
        self.publisher.publish(&self.connection_id, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ended(turn_id: &str) -> OutputMessage {
        OutputMessage::TurnEnded {
            turn_id: turn_id.to_string(),
            delivered: 0,
        }
    }

    #[tokio::test]
    async fn test_publish_in_order() {
        let publisher = EventPublisher::new().arc();
        let mut rx = publisher.register("conn-1");
        let sink = publisher.sink_for("conn-1");

        sink.send(ended("a")).await.unwrap();
        sink.send(ended("b")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().turn_id(), "a");
        assert_eq!(rx.recv().await.unwrap().turn_id(), "b");
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let publisher = EventPublisher::new().arc();
        let result = publisher.publish("missing", ended("a")).await;
        assert!(matches!(result, Err(SinkError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_dropped_receiver_closes_sink() {
        let publisher = EventPublisher::new().arc();
        let rx = publisher.register("conn-1");
        drop(rx);

        let sink = publisher.sink_for("conn-1");
        assert!(matches!(sink.send(ended("a")).await, Err(SinkError::Closed(_))));

        publisher.unregister("conn-1");
        assert!(!publisher.is_registered("conn-1"));
        assert_eq!(publisher.connection_count(), 0);
    }
}
