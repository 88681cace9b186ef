use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::models::AnsweredEvent;

/// Process-local store for tests and sessions that need not survive a restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<Uuid, (DateTime<Utc>, Vec<AnsweredEvent>)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn load_session(&self, session_id: Uuid) -> Result<Option<Vec<AnsweredEvent>>, StoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(&session_id).map(|(_, events)| events.clone()))
    }

    fn save_session(&self, session_id: Uuid, events: &[AnsweredEvent]) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session_id, (Utc::now(), events.to_vec()));
        Ok(())
    }

    fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.remove(&session_id).is_some())
    }

    fn list_sessions(&self) -> Result<Vec<Uuid>, StoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<(DateTime<Utc>, Uuid)> =
            sessions.iter().map(|(id, (saved, _))| (*saved, *id)).collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }
}
