//! Session persistence layer
//!
//! Sessions are owned values loaded and saved through an injected store.
//! Currently uses in-memory; can be replaced with a durable backend.

pub mod session;

pub use session::{ConversationSession, Turn, TurnRole, DEFAULT_HISTORY_WINDOW};

use crate::models::SessionId;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for session persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, creating an empty one on first contact
    async fn load(&self, session_id: &SessionId) -> Result<ConversationSession>;
    async fn save(&self, session: &ConversationSession) -> Result<()>;
}

/// In-memory session store for development and single-process deployments
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, ConversationSession>>>,
    history_window: usize,
}

impl InMemorySessionStore {
    pub fn new(history_window: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            history_window,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &SessionId) -> Result<ConversationSession> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return Ok(session.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.clone())
            .or_insert_with(|| ConversationSession::new(session_id.clone(), self.history_window));
        Ok(session.clone())
    }

    async fn save(&self, session: &ConversationSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}
