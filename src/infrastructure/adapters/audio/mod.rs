//! Audio Adapter - 音频编码与分析

mod volume_analyzer;
pub mod wav;

pub use volume_analyzer::{VolumeAnalyzer, DEFAULT_SLICE_LENGTH_MS};
pub use wav::{encode_wav, tone};
