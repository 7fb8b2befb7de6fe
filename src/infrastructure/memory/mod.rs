//! Memory Layer - In-Memory State Management
//!
//! 实现 TurnManager，管理各连接上活跃 Turn 的内存状态

mod turn_manager;

pub use turn_manager::{InMemoryTurnManager, BARGE_IN_REASON};
