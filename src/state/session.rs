//! Conversation session
//!
//! Everything the engine remembers about one channel+user pair between
//! messages: the confirmation state machine and a bounded window of turns.

use crate::confirmation::ConfirmationStateMachine;
use crate::models::{Intent, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Who produced a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

/// A single message in the session window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: TurnRole,
    pub content: String,
    /// Intent the turn was classified as (user) or answered (agent)
    pub intent: Option<Intent>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>, intent: Option<Intent>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content: content.into(),
            intent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmation: ConfirmationStateMachine,
    /// Oldest first (VecDeque for efficient queue operations)
    turns: VecDeque<Turn>,
    history_window: usize,
}

impl ConversationSession {
    pub fn new(session_id: SessionId, history_window: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            updated_at: now,
            confirmation: ConfirmationStateMachine::new(),
            turns: VecDeque::with_capacity(history_window),
            history_window: history_window.max(1),
        }
    }

    /// Append a turn, dropping the oldest beyond the window.
    pub fn add_turn(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.history_window {
            self.turns.pop_front();
        }
        self.updated_at = Utc::now();
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// N most recent turns, newest first
    pub fn recent_turns(&self, count: usize) -> impl Iterator<Item = &Turn> {
        self.turns.iter().rev().take(count)
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn has_pending_action(&self) -> bool {
        self.confirmation.pending().is_some()
    }
}
