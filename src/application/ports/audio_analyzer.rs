//! Audio Analyzer Port - 口型音量分析

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// 音量包络
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioEnvelope {
    /// 每个切片的归一化 RMS 音量
    pub volumes: Vec<f32>,
    pub slice_length_ms: u32,
    pub duration_ms: u64,
}

/// Audio Analyzer Port
///
/// 同步接口：分析在合成任务内部完成，音频长度只有一句话
pub trait AudioAnalyzerPort: Send + Sync {
    fn analyze(&self, audio: &[u8]) -> Result<AudioEnvelope, AnalyzeError>;
}
