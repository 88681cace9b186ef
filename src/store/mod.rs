//! Session persistence.
//!
//! Only the ordered answer log is stored; everything else is recomputed
//! by replay when a session is loaded.

pub mod memory;
pub mod sqlite;
pub mod writer;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use writer::SessionWriter;

use thiserror::Error;
use uuid::Uuid;

use crate::models::AnsweredEvent;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Session writer has shut down")]
    WriterClosed,
}

pub trait SessionStore: Send + Sync {
    /// Ordered event log of a session, `None` if it was never saved.
    fn load_session(&self, session_id: Uuid) -> Result<Option<Vec<AnsweredEvent>>, StoreError>;

    /// Replace the stored log of a session.
    fn save_session(&self, session_id: Uuid, events: &[AnsweredEvent]) -> Result<(), StoreError>;

    /// Remove a session. Returns whether it existed.
    fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError>;

    /// Stored session ids, most recently saved first.
    fn list_sessions(&self) -> Result<Vec<Uuid>, StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn load_session(&self, session_id: Uuid) -> Result<Option<Vec<AnsweredEvent>>, StoreError> {
        (**self).load_session(session_id)
    }

    fn save_session(&self, session_id: Uuid, events: &[AnsweredEvent]) -> Result<(), StoreError> {
        (**self).save_session(session_id, events)
    }

    fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        (**self).delete_session(session_id)
    }

    fn list_sessions(&self) -> Result<Vec<Uuid>, StoreError> {
        (**self).list_sessions()
    }
}
