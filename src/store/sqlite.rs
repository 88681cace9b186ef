use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::config;
use crate::models::AnsweredEvent;

/// SQLite-backed session store. One connection, serialized by a mutex.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open the store at the default application path.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&config::sessions_db_path())
    }

    /// In-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current schema version (0 before any migration).
    pub fn schema_version(&self) -> i64 {
        get_current_version(&self.lock())
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_assessment_events.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

impl SessionStore for SqliteSessionStore {
    fn load_session(&self, session_id: Uuid) -> Result<Option<Vec<AnsweredEvent>>, StoreError> {
        let conn = self.lock();

        let exists = conn.query_row(
            "SELECT 1 FROM assessment_sessions WHERE id = ?1",
            params![session_id.to_string()],
            |_| Ok(()),
        );
        match exists {
            Ok(()) => {}
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let mut stmt = conn.prepare(
            "SELECT payload FROM assessment_events WHERE session_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![session_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(serde_json::from_str::<AnsweredEvent>(&row?)?);
        }
        Ok(Some(events))
    }

    fn save_session(&self, session_id: Uuid, events: &[AnsweredEvent]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let id = session_id.to_string();
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO assessment_sessions (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            params![id, now],
        )?;
        tx.execute(
            "DELETE FROM assessment_events WHERE session_id = ?1",
            params![id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO assessment_events (session_id, seq, payload) VALUES (?1, ?2, ?3)",
            )?;
            for (seq, event) in events.iter().enumerate() {
                let payload = serde_json::to_string(event)?;
                stmt.execute(params![id, seq as i64, payload])?;
            }
        }
        tx.commit()?;

        tracing::debug!(session_id = %session_id, events = events.len(), "Session saved");
        Ok(())
    }

    fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM assessment_sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn list_sessions(&self) -> Result<Vec<Uuid>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id FROM assessment_sessions ORDER BY updated_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            let raw = row?;
            match Uuid::parse_str(&raw) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(error = %e, "Skipping session with malformed id"),
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionSource;

    fn sample_log() -> Vec<AnsweredEvent> {
        vec![
            AnsweredEvent::complaint("I have chest pain"),
            AnsweredEvent::answer(
                "How long have you been experiencing these symptoms?",
                "1-3 days",
                QuestionSource::Fixed,
            ),
            AnsweredEvent::answer("Does the pain spread to your arm?", "No", QuestionSource::Dynamic),
        ]
    }

    #[test]
    fn schema_version_is_current() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version(), 1);
    }

    #[test]
    fn migration_idempotent() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let conn = store.lock();
        assert!(run_migrations(&conn).is_ok());
    }

    #[test]
    fn save_and_load_preserves_order() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let log = sample_log();
        store.save_session(id, &log).unwrap();

        let loaded = store.load_session(id).unwrap().unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn missing_session_is_none() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        assert!(store.load_session(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn saving_shorter_log_replaces_rows() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        store.save_session(id, &sample_log()).unwrap();
        store.save_session(id, &sample_log()[..1]).unwrap();
        assert_eq!(store.load_session(id).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn empty_log_still_marks_session() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        store.save_session(id, &[]).unwrap();
        assert_eq!(store.load_session(id).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn delete_cascades_to_events() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        store.save_session(id, &sample_log()).unwrap();
        assert!(store.delete_session(id).unwrap());
        assert!(store.load_session(id).unwrap().is_none());

        let orphans: i64 = store
            .lock()
            .query_row("SELECT COUNT(*) FROM assessment_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(!store.delete_session(id).unwrap());
    }

    #[test]
    fn list_sessions_returns_all_ids() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.save_session(a, &sample_log()).unwrap();
        store.save_session(b, &sample_log()).unwrap();
        let ids = store.list_sessions().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let id = Uuid::new_v4();
        {
            let store = SqliteSessionStore::open(&path).unwrap();
            store.save_session(id, &sample_log()).unwrap();
        }
        let reopened = SqliteSessionStore::open(&path).unwrap();
        let loaded = reopened.load_session(id).unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].source, QuestionSource::Complaint);
        assert_eq!(loaded[2].answer, "No");
        assert_eq!(reopened.schema_version(), 1);
    }
}
