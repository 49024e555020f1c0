//! Session and Thread Registry
//!
//! In-memory bookkeeping for registered directories. A session is keyed by
//! an identifier derived deterministically from the folder path, so the same
//! directory always maps to the same session across restarts. Threads are
//! process-local conversations within a session; their IDs are random and
//! independent of any remote conversation identifier.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::handler::{AiHandler, AiKind};
use crate::scanner::FileRecord;

/// Canned reply for an empty chat message; recorded without contacting the
/// backend.
pub const GREETING: &str = "Sup!";

/// Who authored a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    System,
}

/// One entry of a thread's append-only message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// One conversation within a session
#[derive(Debug, Clone)]
pub struct Thread {
    pub thread_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Set when the thread is explicitly closed; closing is not implemented,
    /// so this stays `None` for the thread's lifetime.
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<ChatEntry>,
    pub ai_kind: AiKind,
}

impl Thread {
    fn new(thread_id: Uuid, ai_kind: AiKind) -> Self {
        Self {
            thread_id,
            start_time: Utc::now(),
            end_time: None,
            messages: Vec::new(),
            ai_kind,
        }
    }
}

/// A registered directory under conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub folder: String,
    /// Latest snapshot, replaced wholesale on each update
    pub files: Vec<FileRecord>,
    pub threads: HashMap<Uuid, Thread>,
}

/// The serialized snapshot handed to the AI for grounding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub files: Vec<FileRecord>,
}

/// Derive the session identifier from a folder path. Trailing separators
/// are ignored so `/a/b` and `/a/b/` name the same session.
pub fn session_id_for_path(path: &str) -> Uuid {
    let normalized = normalize_path(path);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, normalized.as_bytes())
}

fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Summarize a context to a compact textual listing, one line per file.
pub fn summarize_files(files: &[FileRecord]) -> String {
    let lines: Vec<String> = files
        .iter()
        .map(|f| format!("{} ({}, {} bytes)", f.name, f.path, f.size))
        .collect();
    format!("Files:\n{}\n", lines.join("\n"))
}

/// Thread-safe session store. All access goes through this type so
/// concurrent requests serialize per map; the lock is never held across an
/// await point.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `path`, or add a thread to the existing one.
    /// The supplied snapshot replaces any stored file list either way.
    /// Returns the session and freshly generated thread identifiers.
    pub fn start_session(
        &self,
        path: &str,
        folder: String,
        files: Vec<FileRecord>,
        ai_kind: AiKind,
    ) -> (Uuid, Uuid) {
        let session_id = session_id_for_path(path);
        let thread_id = Uuid::new_v4();

        let mut sessions = self.sessions.write();
        let session = sessions.entry(session_id).or_insert_with(|| Session {
            session_id,
            folder,
            files: Vec::new(),
            threads: HashMap::new(),
        });
        session.files = files;
        session
            .threads
            .insert(thread_id, Thread::new(thread_id, ai_kind));

        (session_id, thread_id)
    }

    pub fn session_exists(&self, session_id: Uuid) -> bool {
        self.sessions.read().contains_key(&session_id)
    }

    pub fn thread_exists(&self, session_id: Uuid, thread_id: Uuid) -> bool {
        self.sessions
            .read()
            .get(&session_id)
            .map(|s| s.threads.contains_key(&thread_id))
            .unwrap_or(false)
    }

    /// Replace the session's stored file list with a refreshed snapshot.
    pub fn replace_files(&self, session_id: Uuid, files: Vec<FileRecord>) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.files = files;
        }
    }

    /// Clone of the session's current file snapshot
    pub fn files_snapshot(&self, session_id: Uuid) -> Option<Vec<FileRecord>> {
        self.sessions
            .read()
            .get(&session_id)
            .map(|s| s.files.clone())
    }

    /// Append an entry to a thread's message log. Returns false if the
    /// session or thread is unknown.
    pub fn append_entry(
        &self,
        session_id: Uuid,
        thread_id: Uuid,
        speaker: Speaker,
        text: impl Into<String>,
    ) -> bool {
        let mut sessions = self.sessions.write();
        match sessions
            .get_mut(&session_id)
            .and_then(|s| s.threads.get_mut(&thread_id))
        {
            Some(thread) => {
                thread.messages.push(ChatEntry {
                    speaker,
                    text: text.into(),
                });
                true
            }
            None => false,
        }
    }

    /// Clone of a thread's message log, for inspection
    pub fn thread_messages(&self, session_id: Uuid, thread_id: Uuid) -> Option<Vec<ChatEntry>> {
        self.sessions
            .read()
            .get(&session_id)
            .and_then(|s| s.threads.get(&thread_id))
            .map(|t| t.messages.clone())
    }

    pub fn thread_count(&self, session_id: Uuid) -> usize {
        self.sessions
            .read()
            .get(&session_id)
            .map(|s| s.threads.len())
            .unwrap_or(0)
    }
}

/// Handler bindings, one per thread identifier. Each handler sits behind an
/// async mutex so concurrent chats on the same thread serialize while
/// distinct threads proceed independently.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<Uuid, Arc<Mutex<AiHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a thread identifier unless one is already bound.
    pub fn bind(&self, thread_id: Uuid, handler: AiHandler) {
        self.handlers
            .write()
            .entry(thread_id)
            .or_insert_with(|| Arc::new(Mutex::new(handler)));
    }

    pub fn get(&self, thread_id: Uuid) -> Option<Arc<Mutex<AiHandler>>> {
        self.handlers.read().get(&thread_id).cloned()
    }
}
