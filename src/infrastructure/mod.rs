//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现，以及把它们串起来的流水线

pub mod adapters;
pub mod events;
pub mod memory;
pub mod pipeline;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use events::{ConnectionSink, EventPublisher};
pub use memory::InMemoryTurnManager;
pub use pipeline::StreamingPipeline;
pub use worker::{SynthesisScheduler, SynthesisSchedulerConfig, TurnReport};
