//! Pipeline Layer - 流水线组装
//!
//! 把分句、标注、渲染和合成调度串成一个按 Turn 运行的流水线

mod assembler;
mod stages;

pub use assembler::{build_strategy, StreamingPipeline};
pub use stages::{SegmentOutcome, SentenceRenderer, STAGE_CHANNEL_CAPACITY};
