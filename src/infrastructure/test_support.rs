//! 测试用输出端：记录所有消息，可在投递指定序号后取消 Turn

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::application::ports::{OutputMessage, OutputSinkPort, SentenceOutput, SinkError};
use crate::domain::Turn;

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OutputMessage>>,
    cancel_at: Option<(u64, Arc<Turn>)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录到序号 `ordinal` 的句子后取消 `turn`
    pub fn cancelling_at(ordinal: u64, turn: Arc<Turn>) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            cancel_at: Some((ordinal, turn)),
        }
    }

    pub fn messages(&self) -> Vec<OutputMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn sentences(&self) -> Vec<SentenceOutput> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutputMessage::Sentence(output) => Some(output),
                _ => None,
            })
            .collect()
    }

    pub fn ordinals(&self) -> Vec<u64> {
        self.sentences().iter().map(|s| s.ordinal).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutputMessage::Warning { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl OutputSinkPort for RecordingSink {
    async fn send(&self, message: OutputMessage) -> Result<(), SinkError> {
        let ordinal = match &message {
            OutputMessage::Sentence(output) => Some(output.ordinal),
            _ => None,
        };
        self.messages.lock().unwrap().push(message);

        if let (Some(ordinal), Some((at, turn))) = (ordinal, &self.cancel_at) {
            if ordinal == *at {
                turn.cancel("cancelled by test");
            }
        }
        Ok(())
    }
}
