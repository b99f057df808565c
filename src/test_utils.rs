//! Test utilities for Nymval
//!
//! Temporary storage, a gateway wrapper that counts writes and can be
//! told to fail assistant appends, and a log capture for asserting on
//! emitted warnings.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::auth::StaticIdentity;
use crate::chat::{ChatMessage, ChatSession, Role};
use crate::error::{NymvalError, Result};
use crate::storage::{ConversationGateway, SqliteStorage};

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// SQLite storage for `user` inside a fresh temporary directory
///
/// Keep the returned `TempDir` alive for as long as the storage is used.
pub fn temp_storage(user: &str) -> (SqliteStorage, TempDir) {
    let dir = temp_dir();
    let storage = SqliteStorage::new_with_path(
        dir.path().join("history.db"),
        Arc::new(StaticIdentity::new(user)),
    )
    .expect("Failed to create storage");
    (storage, dir)
}

/// Shared buffer that formatted log lines are written into
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Everything logged so far
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route this thread's log events into a buffer until the guard drops
///
/// `#[tokio::test]` runs on a current-thread runtime, so events emitted by
/// the awaited future land in the buffer.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}

/// Gateway over real storage that counts `append_message` calls
pub struct CountingGateway {
    inner: SqliteStorage,
    appends: AtomicUsize,
    fail_assistant: AtomicBool,
}

impl CountingGateway {
    /// Wrap `inner`
    pub fn new(inner: SqliteStorage) -> Self {
        Self {
            inner,
            appends: AtomicUsize::new(0),
            fail_assistant: AtomicBool::new(false),
        }
    }

    /// Number of append attempts so far
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Make assistant appends fail with a storage error
    pub fn fail_assistant_appends(&self, fail: bool) {
        self.fail_assistant.store(fail, Ordering::SeqCst);
    }
}

/// Counting gateway over temporary storage for user `alice`
pub fn counting_gateway() -> (Arc<CountingGateway>, TempDir) {
    let (storage, dir) = temp_storage("alice");
    (Arc::new(CountingGateway::new(storage)), dir)
}

#[async_trait]
impl ConversationGateway for CountingGateway {
    async fn list_sessions_for_user(&self) -> Result<Vec<ChatSession>> {
        self.inner.list_sessions_for_user().await
    }

    async fn create_session(&self, title: &str, initial_model_id: &str) -> Result<ChatSession> {
        self.inner.create_session(title, initial_model_id).await
    }

    async fn get_session(&self, session_id: &str) -> Result<ChatSession> {
        self.inner.get_session(session_id).await
    }

    async fn append_message(&self, session_id: &str, message: ChatMessage) -> Result<ChatMessage> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if message.role == Role::Assistant && self.fail_assistant.load(Ordering::SeqCst) {
            return Err(NymvalError::Storage("simulated write failure".to_string()).into());
        }
        self.inner.append_message(session_id, message).await
    }

    async fn add_session_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        self.inner.add_session_model(session_id, model_id).await
    }

    async fn touch_session(&self, session_id: &str, at: i64) -> Result<()> {
        self.inner.touch_session(session_id, at).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        self.inner.delete_session(session_id).await
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<()> {
        self.inner.rename_session(session_id, title).await
    }
}
