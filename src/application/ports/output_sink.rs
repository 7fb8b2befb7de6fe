//! Output Sink Port - 客户端输出
//!
//! 每个 Turn 的消息顺序: TurnStarted, Sentence (按序号), Warning (任意位置),
//! 最后是 TurnEnded 或 TurnCancelled 之一。

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::Actions;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink closed: {0}")]
    Closed(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
}

/// 一句完整的输出
#[derive(Debug, Clone, Serialize)]
pub struct SentenceOutput {
    pub turn_id: String,
    pub ordinal: u64,
    pub display_text: String,
    /// 合成音频；为空表示静默句子（或合成失败）
    #[serde(skip_serializing)]
    pub audio: Vec<u8>,
    pub audio_bytes: usize,
    pub actions: Actions,
    /// 口型音量，每 `slice_length_ms` 一个值，范围 [0, 1]
    pub volumes: Vec<f32>,
    pub slice_length_ms: u32,
    pub duration_ms: u64,
}

/// 输出消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutputMessage {
    #[serde(rename = "turn_started")]
    TurnStarted {
        turn_id: String,
        connection_id: String,
    },

    #[serde(rename = "sentence")]
    Sentence(SentenceOutput),

    /// 非致命错误
    #[serde(rename = "warning")]
    Warning {
        turn_id: String,
        ordinal: Option<u64>,
        message: String,
    },

    #[serde(rename = "turn_ended")]
    TurnEnded { turn_id: String, delivered: u64 },

    #[serde(rename = "turn_cancelled")]
    TurnCancelled { turn_id: String, reason: String },
}

impl OutputMessage {
    pub fn turn_id(&self) -> &str {
        match self {
            Self::TurnStarted { turn_id, .. }
            | Self::Warning { turn_id, .. }
            | Self::TurnEnded { turn_id, .. }
            | Self::TurnCancelled { turn_id, .. } => turn_id,
            Self::Sentence(output) => &output.turn_id,
        }
    }
}

/// Output Sink Port
///
/// 发送失败意味着客户端已不可用，调用方应取消当前 Turn
#[async_trait]
pub trait OutputSinkPort: Send + Sync {
    async fn send(&self, message: OutputMessage) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let message = OutputMessage::Sentence(SentenceOutput {
            turn_id: "t1".into(),
            ordinal: 2,
            display_text: "Hi!".into(),
            audio: vec![1, 2, 3],
            audio_bytes: 3,
            actions: Actions::single(3),
            volumes: vec![0.5],
            slice_length_ms: 20,
            duration_ms: 20,
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["event"], "sentence");
        assert_eq!(json["data"]["ordinal"], 2);
        assert_eq!(json["data"]["actions"]["expression_ids"][0], 3);
        assert!(json["data"].get("audio").is_none());
        assert_eq!(message.turn_id(), "t1");

        let ended = serde_json::to_value(OutputMessage::TurnEnded {
            turn_id: "t1".into(),
            delivered: 4,
        })
        .unwrap();
        assert_eq!(ended["event"], "turn_ended");
    }
}
