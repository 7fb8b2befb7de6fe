//! Worker Layer - Background Task Processing
//!
//! 实现 SynthesisScheduler，处理 TTS 合成任务并按序投递

mod synthesis_scheduler;

pub use synthesis_scheduler::{
    JobState, SynthesisScheduler, SynthesisSchedulerConfig, TurnReport,
};
