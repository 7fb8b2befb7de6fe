//! Turn - 一次完整的助手回复
//!
//! Turn 拥有句子序号分配器和取消令牌；状态只会从 Active
//! 转到 Completed 或 Cancelled 之一，之后不再变化。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Turn ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turn 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug)]
struct Lifecycle {
    state: TurnState,
    cancel_reason: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

/// 一次回复
#[derive(Debug)]
pub struct Turn {
    id: TurnId,
    connection_id: String,
    next_ordinal: AtomicU64,
    cancel_token: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    started_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            connection_id: connection_id.into(),
            next_ordinal: AtomicU64::new(0),
            cancel_token: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: TurnState::Active,
                cancel_reason: None,
                finished_at: None,
            }),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 分配下一个句子序号（从 0 开始连续）
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal.fetch_add(1, Ordering::SeqCst)
    }

    /// 已分配的序号数
    pub fn sentence_count(&self) -> u64 {
        self.next_ordinal.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TurnState {
        self.lock().state
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.lock().cancel_reason.clone()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.lock().finished_at
    }

    /// 取消 Turn；仅在 Active 状态下生效，返回是否发生了状态变化
    pub fn cancel(&self, reason: &str) -> bool {
        {
            let mut lifecycle = self.lock();
            if lifecycle.state != TurnState::Active {
                return false;
            }
            lifecycle.state = TurnState::Cancelled;
            lifecycle.cancel_reason = Some(reason.to_string());
            lifecycle.finished_at = Some(Utc::now());
        }

        tracing::info!(turn_id = %self.id, reason, "Turn cancelled");
        self.cancel_token.cancel();
        true
    }

    /// 标记完成；已取消的 Turn 不会变为完成
    pub fn complete(&self) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.state != TurnState::Active {
            return false;
        }
        lifecycle.state = TurnState::Completed;
        lifecycle.finished_at = Some(Utc::now());
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 等待取消
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await
    }

    /// 子令牌，供独立任务监听取消
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_are_gapless() {
        let turn = Turn::new("conn-1");
        let ordinals: Vec<u64> = (0..5).map(|_| turn.next_ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);
        assert_eq!(turn.sentence_count(), 5);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let turn = Turn::new("conn-1");
        assert!(turn.cancel("barge-in"));
        assert!(!turn.cancel("again"));
        assert_eq!(turn.state(), TurnState::Cancelled);
        assert_eq!(turn.cancel_reason().as_deref(), Some("barge-in"));
        assert!(turn.is_cancelled());
        assert!(turn.finished_at().is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let turn = Turn::new("conn-1");
        assert!(turn.complete());
        assert!(!turn.cancel("late"));
        assert_eq!(turn.state(), TurnState::Completed);
        assert!(!turn.is_cancelled());

        let cancelled = Turn::new("conn-1");
        cancelled.cancel("stop");
        assert!(!cancelled.complete());
        assert_eq!(cancelled.state(), TurnState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let turn = std::sync::Arc::new(Turn::new("conn-1"));
        let waiter = {
            let turn = turn.clone();
            tokio::spawn(async move { turn.cancelled().await })
        };
        turn.cancel("user interrupt");
        waiter.await.unwrap();
        assert!(turn.cancel_token().is_cancelled());
    }
}
