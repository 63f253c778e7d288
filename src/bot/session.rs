//! Conversation tracker — per-chat sessions held in memory.
//!
//! A chat with no entry is waiting for an email address. A chat with an
//! entry has an accepted address and is waiting for the message body.
//! Nothing survives a restart.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::channels::ChatId;

/// State kept for a chat between "email accepted" and "message relayed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub email: String,
}

/// In-memory session store, injected into the bot at startup.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ChatId, ChatSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the session for `chat_id`. No validation here.
    pub async fn record_email(&self, chat_id: &ChatId, email: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            chat_id.clone(),
            ChatSession {
                email: email.to_string(),
            },
        );
        debug!(chat_id = %chat_id, "Session recorded");
    }

    pub async fn has_email(&self, chat_id: &ChatId) -> bool {
        self.sessions.read().await.contains_key(chat_id)
    }

    /// The captured address, or `None` if the chat has no session.
    pub async fn get_email(&self, chat_id: &ChatId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(chat_id)
            .map(|s| s.email.clone())
    }

    /// Remove and return the captured address in one step.
    ///
    /// Stands in for `get_email` followed by `clear` after a relay attempt,
    /// so two messages can never both claim the same session.
    pub async fn take(&self, chat_id: &ChatId) -> Option<String> {
        let removed = self.sessions.write().await.remove(chat_id);
        if removed.is_some() {
            debug!(chat_id = %chat_id, "Session taken");
        }
        removed.map(|s| s.email)
    }

    /// Remove the session. Clearing a chat without a session is a no-op.
    pub async fn clear(&self, chat_id: &ChatId) {
        if self.sessions.write().await.remove(chat_id).is_some() {
            debug!(chat_id = %chat_id, "Session cleared");
        }
    }

    /// Drop every session. Called on shutdown.
    pub async fn clear_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
