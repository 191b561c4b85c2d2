//! Conversation storage contracts and a basic in-memory implementation.
//!
//! Histories are stored in the canonical wire shape, so any backend that
//! persists the serialized messages can be read back by any vendor adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use tcommon::{BoxFuture, SessionId};
use tprovider::Message;

use crate::ChatError;

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

pub trait ConversationStore: Send + Sync {
    fn load<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<Message>, ChatError>>;

    /// Replaces the stored history for the session.
    fn save<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> ChatFuture<'a, Result<(), ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    sessions: Mutex<HashMap<SessionId, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn load<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<Message>, ChatError>> {
        Box::pin(async move {
            let sessions = self
                .sessions
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            Ok(sessions.get(session_id).cloned().unwrap_or_default())
        })
    }

    fn save<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let mut sessions = self
                .sessions
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            sessions.insert(session_id.clone(), messages);
            Ok(())
        })
    }
}
