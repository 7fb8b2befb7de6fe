//! 应用层 - 端口与错误
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、TokenSource、OutputSink、AudioAnalyzer、TurnManager）
//! - error: 流水线错误定义

pub mod error;
pub mod ports;

pub use error::PipelineError;

pub use ports::{
    // Audio analyzer
    AnalyzeError,
    AudioAnalyzerPort,
    AudioEnvelope,
    // Output sink
    OutputMessage,
    OutputSinkPort,
    SentenceOutput,
    SinkError,
    // Token source
    SourceError,
    TokenSourcePort,
    UpstreamEvent,
    // TTS engine
    SynthesisRequest,
    SynthesisResponse,
    TtsEnginePort,
    TtsError,
    // Turn manager
    TurnManagerPort,
};
