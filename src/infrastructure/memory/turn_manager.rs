//! In-Memory Turn Manager Implementation

use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::TurnManagerPort;
use crate::domain::Turn;

pub const BARGE_IN_REASON: &str = "interrupted by a new turn";

/// 内存 Turn 管理器
pub struct InMemoryTurnManager {
    /// connection_id -> 活跃 Turn
    turns: DashMap<String, Arc<Turn>>,
}

impl InMemoryTurnManager {
    pub fn new() -> Self {
        Self {
            turns: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryTurnManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnManagerPort for InMemoryTurnManager {
    fn begin(&self, connection_id: &str) -> Arc<Turn> {
        let turn = Arc::new(Turn::new(connection_id));

        if let Some(previous) = self
            .turns
            .insert(connection_id.to_string(), Arc::clone(&turn))
        {
            if previous.cancel(BARGE_IN_REASON) {
                tracing::info!(
                    connection_id = %connection_id,
                    previous_turn = %previous.id(),
                    turn_id = %turn.id(),
                    "Barge-in: previous turn cancelled"
                );
            }
        }

        tracing::debug!(connection_id = %connection_id, turn_id = %turn.id(), "Turn started");
        turn
    }

    fn cancel(&self, connection_id: &str, reason: &str) -> bool {
        match self.turns.get(connection_id) {
            Some(turn) => turn.cancel(reason),
            None => false,
        }
    }

    fn end(&self, turn: &Turn) {
        let removed = self
            .turns
            .remove_if(turn.connection_id(), |_, active| active.id() == turn.id());
        if removed.is_some() {
            tracing::debug!(
                connection_id = %turn.connection_id(),
                turn_id = %turn.id(),
                state = ?turn.state(),
                "Turn ended"
            );
        }
    }

    fn active(&self, connection_id: &str) -> Option<Arc<Turn>> {
        self.turns.get(connection_id).map(|t| Arc::clone(&t))
    }

    fn active_count(&self) -> usize {
        self.turns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TurnState;

    #[test]
    fn test_begin_interrupts_previous_turn() {
        let manager = InMemoryTurnManager::new();
        let first = manager.begin("conn-1");
        let second = manager.begin("conn-1");

        assert_eq!(first.state(), TurnState::Cancelled);
        assert_eq!(first.cancel_reason().as_deref(), Some(BARGE_IN_REASON));
        assert_eq!(second.state(), TurnState::Active);
        assert_eq!(manager.active("conn-1").unwrap().id(), second.id());
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_connections_are_independent() {
        let manager = InMemoryTurnManager::new();
        let a = manager.begin("conn-a");
        let _b = manager.begin("conn-b");

        assert!(manager.cancel("conn-b", "user stop"));
        assert_eq!(a.state(), TurnState::Active);
        assert_eq!(manager.active_count(), 2);
        assert!(!manager.cancel("conn-c", "nothing"));
    }

    #[test]
    fn test_end_only_removes_matching_turn() {
        let manager = InMemoryTurnManager::new();
        let first = manager.begin("conn-1");
        let second = manager.begin("conn-1");

        // 旧 Turn 结束不影响新 Turn
        manager.end(&first);
        assert!(manager.active("conn-1").is_some());

        second.complete();
        manager.end(&second);
        assert!(manager.active("conn-1").is_none());
        assert_eq!(manager.active_count(), 0);
    }
}
