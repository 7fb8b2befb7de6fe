//! 应用层错误定义
//!
//! 流水线错误分为两类：
//! - 致命: 取消当前 Turn（上游断开、配置无效）
//! - 非致命: 记录日志并继续（分句溢出、标签未闭合、单句合成失败）

use thiserror::Error;

/// 流水线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 缓冲区超过上限被强制切分
    #[error("Segmentation buffer overflow at {chars} chars")]
    SegmentationOverflow { chars: usize },

    /// 流结束时标签仍未闭合
    #[error("Unterminated tag: {0}")]
    UnterminatedTag(String),

    /// 单句合成失败（该句以无音频方式投递）
    #[error("Synthesis failed for sentence {ordinal}: {reason}")]
    SynthesisFailure { ordinal: u64, reason: String },

    /// 上游在 end-of-turn 之前断开
    #[error("Upstream disconnected: {0}")]
    UpstreamDisconnect(String),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PipelineError {
    /// 是否需要终止当前 Turn
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UpstreamDisconnect(_) | Self::InvalidConfiguration(_)
        )
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(PipelineError::UpstreamDisconnect("eof".into()).is_fatal());
        assert!(PipelineError::invalid_config("bad").is_fatal());
        assert!(!PipelineError::SynthesisFailure {
            ordinal: 3,
            reason: "timeout".into()
        }
        .is_fatal());
        assert!(!PipelineError::UnterminatedTag("think".into()).is_fatal());
    }
}
