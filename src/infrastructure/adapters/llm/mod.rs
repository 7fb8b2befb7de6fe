//! LLM Adapter - 上游文本增量来源

mod token_source;

pub use token_source::{ChannelTokenSource, StreamTokenSource};
