//! Turn Manager Port - 连接上的 Turn 生命周期管理

use std::sync::Arc;

use crate::domain::Turn;

/// Turn Manager Port
///
/// 每个连接同一时刻最多一个活跃 Turn；开始新 Turn 会打断旧 Turn（barge-in）
pub trait TurnManagerPort: Send + Sync {
    /// 开始新 Turn，取消该连接上仍在进行的 Turn
    fn begin(&self, connection_id: &str) -> Arc<Turn>;

    /// 取消连接上的活跃 Turn，返回是否确实取消了
    fn cancel(&self, connection_id: &str, reason: &str) -> bool;

    /// Turn 结束后移除（仅当它仍是该连接的活跃 Turn）
    fn end(&self, turn: &Turn);

    fn active(&self, connection_id: &str) -> Option<Arc<Turn>>;

    fn active_count(&self) -> usize;
}
