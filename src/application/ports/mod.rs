//! Application Ports - 端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_analyzer;
mod output_sink;
mod token_source;
mod tts_engine;
mod turn_manager;

pub use audio_analyzer::{AnalyzeError, AudioAnalyzerPort, AudioEnvelope};
pub use output_sink::{OutputMessage, OutputSinkPort, SentenceOutput, SinkError};
pub use token_source::{SourceError, TokenSourcePort, UpstreamEvent};
pub use tts_engine::{SynthesisRequest, SynthesisResponse, TtsEnginePort, TtsError};
pub use turn_manager::TurnManagerPort;
