//! Background session writer.
//!
//! Snapshots are handed over a channel and written on a separate thread so
//! saving never blocks the conversation. Snapshots of the same session that
//! arrive within one debounce window collapse into the newest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::models::AnsweredEvent;

/// Default delay between the first queued snapshot and the write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

enum WriterMessage {
    Save {
        session_id: Uuid,
        events: Vec<AnsweredEvent>,
    },
    Flush(mpsc::Sender<()>),
}

/// Handle for the writer thread.
///
/// Dropping the handle writes anything still queued and joins the thread.
pub struct SessionWriter {
    sender: Option<mpsc::Sender<WriterMessage>>,
    handle: Option<JoinHandle<()>>,
    failures: Arc<AtomicUsize>,
}

impl SessionWriter {
    pub fn start(store: Arc<dyn SessionStore>) -> Self {
        Self::with_debounce(store, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(store: Arc<dyn SessionStore>, debounce: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();

        let handle = std::thread::spawn(move || {
            tracing::info!(debounce_ms = debounce.as_millis() as u64, "Session writer started");
            writer_loop(&*store, &receiver, debounce, &counter);
        });

        Self {
            sender: Some(sender),
            handle: Some(handle),
            failures,
        }
    }

    /// Queue a snapshot of a session's log. Returns immediately.
    pub fn submit(&self, session_id: Uuid, events: Vec<AnsweredEvent>) -> Result<(), StoreError> {
        self.send(WriterMessage::Save { session_id, events })
    }

    /// Write everything queued so far and wait until it is done.
    pub fn flush(&self) -> Result<(), StoreError> {
        let (ack, done) = mpsc::channel();
        self.send(WriterMessage::Flush(ack))?;
        done.recv().map_err(|_| StoreError::WriterClosed)
    }

    /// Number of saves that failed since start. Failed snapshots are dropped.
    pub fn failed_writes(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Stop accepting snapshots, write what is queued, and join the thread.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }

    fn send(&self, message: WriterMessage) -> Result<(), StoreError> {
        self.sender
            .as_ref()
            .ok_or(StoreError::WriterClosed)?
            .send(message)
            .map_err(|_| StoreError::WriterClosed)
    }
}

impl Drop for SessionWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn writer_loop(
    store: &dyn SessionStore,
    receiver: &mpsc::Receiver<WriterMessage>,
    debounce: Duration,
    failures: &AtomicUsize,
) {
    let mut pending: HashMap<Uuid, Vec<AnsweredEvent>> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let message = match deadline {
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
            Some(at) => {
                let wait = at.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(wait) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        write_pending(store, &mut pending, failures);
                        deadline = None;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        match message {
            WriterMessage::Save { session_id, events } => {
                pending.insert(session_id, events);
                deadline.get_or_insert_with(|| Instant::now() + debounce);
            }
            WriterMessage::Flush(ack) => {
                write_pending(store, &mut pending, failures);
                deadline = None;
                let _ = ack.send(());
            }
        }
    }

    write_pending(store, &mut pending, failures);
    tracing::info!("Session writer shutting down");
}

fn write_pending(
    store: &dyn SessionStore,
    pending: &mut HashMap<Uuid, Vec<AnsweredEvent>>,
    failures: &AtomicUsize,
) {
    for (session_id, events) in pending.drain() {
        if let Err(e) = store.save_session(session_id, &events) {
            failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(session_id = %session_id, error = %e, "Session save failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionSource;
    use crate::store::InMemorySessionStore;

    /// Counts saves and optionally fails them.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemorySessionStore,
        saves: AtomicUsize,
        fail: bool,
    }

    impl SessionStore for CountingStore {
        fn load_session(&self, id: Uuid) -> Result<Option<Vec<AnsweredEvent>>, StoreError> {
            self.inner.load_session(id)
        }

        fn save_session(&self, id: Uuid, events: &[AnsweredEvent]) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save_session(id, events)
        }

        fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete_session(id)
        }

        fn list_sessions(&self) -> Result<Vec<Uuid>, StoreError> {
            self.inner.list_sessions()
        }
    }

    fn log(answers: usize) -> Vec<AnsweredEvent> {
        let mut events = vec![AnsweredEvent::complaint("fever")];
        for i in 0..answers {
            events.push(AnsweredEvent::answer(&format!("Q{i}?"), "yes", QuestionSource::Dynamic));
        }
        events
    }

    #[test]
    fn burst_of_snapshots_is_written_once() {
        let store = Arc::new(CountingStore::default());
        let writer = SessionWriter::with_debounce(store.clone(), Duration::from_secs(60));
        let id = Uuid::new_v4();

        writer.submit(id, log(1)).unwrap();
        writer.submit(id, log(2)).unwrap();
        writer.submit(id, log(3)).unwrap();
        writer.flush().unwrap();

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(store.load_session(id).unwrap().unwrap().len(), 4);
    }

    #[test]
    fn separate_sessions_are_both_written() {
        let store = Arc::new(CountingStore::default());
        let writer = SessionWriter::with_debounce(store.clone(), Duration::from_secs(60));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        writer.submit(a, log(1)).unwrap();
        writer.submit(b, log(2)).unwrap();
        writer.flush().unwrap();

        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
        assert!(store.load_session(a).unwrap().is_some());
        assert!(store.load_session(b).unwrap().is_some());
    }

    #[test]
    fn debounce_elapses_without_flush() {
        let store = Arc::new(CountingStore::default());
        let writer = SessionWriter::with_debounce(store.clone(), Duration::from_millis(10));
        let id = Uuid::new_v4();
        writer.submit(id, log(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while store.saves.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_writes_queued_snapshots() {
        let store = Arc::new(CountingStore::default());
        let id = Uuid::new_v4();
        {
            let writer = SessionWriter::with_debounce(store.clone(), Duration::from_secs(60));
            writer.submit(id, log(2)).unwrap();
        }
        assert_eq!(store.load_session(id).unwrap().unwrap().len(), 3);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let mut writer = SessionWriter::start(store);
        writer.shutdown();
        assert!(matches!(
            writer.submit(Uuid::new_v4(), log(0)),
            Err(StoreError::WriterClosed)
        ));
        assert!(matches!(writer.flush(), Err(StoreError::WriterClosed)));
    }

    #[test]
    fn failed_saves_are_counted() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..CountingStore::default()
        });
        let writer = SessionWriter::with_debounce(store.clone(), Duration::from_secs(60));
        writer.submit(Uuid::new_v4(), log(1)).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.failed_writes(), 1);
    }
}
