//! Events - 输出消息推送

mod publisher;

pub use publisher::{ConnectionSink, EventPublisher, DEFAULT_CHANNEL_CAPACITY};
