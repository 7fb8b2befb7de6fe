//! Avatar Stream - 流式文本到字幕、表情与语音的处理流水线
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 分句、标签跟踪、表情标注、字幕与朗读文本、Turn 生命周期
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TokenSource, TtsEngine, AudioAnalyzer, OutputSink, TurnManager）
//! - Error: 流水线错误分类
//!
//! 基础设施层 (infrastructure/):
//! - Pipeline: 各阶段的组装与驱动
//! - Worker: SynthesisScheduler 并发合成与按序投递
//! - Memory: TurnManager 内存实现（barge-in）
//! - Adapters: TTS Client, Token Source, 音量分析
//! - Events: 按连接的输出通道

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
pub use infrastructure::StreamingPipeline;
