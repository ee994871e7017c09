//! Conversation state and the process-wide session registry.
//!
//! A session is created on first use of a thread id and lives until it is
//! evicted for idleness or the process exits. Nothing is persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

/// Who produced a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

/// One message of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self { role: Role::Ai, content: content.into() }
    }
}

/// State of one conversation thread.
///
/// `history` only grows by complete (human, ai) pairs through
/// [`commit`](ConversationState::commit).
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub thread_id: String,
    history: Vec<Turn>,
    /// Context gathered by the cycle in progress (or the last one).
    pub pending_context: Option<String>,
    /// Answer of the last completed cycle.
    pub pending_answer: Option<String>,
    last_active: Instant,
}

impl ConversationState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            history: Vec::new(),
            pending_context: None,
            pending_answer: None,
            last_active: Instant::now(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Append a completed exchange.
    pub fn commit(&mut self, input: impl Into<String>, answer: impl Into<String>) {
        let answer = answer.into();
        self.history.push(Turn::human(input));
        self.history.push(Turn::ai(answer.clone()));
        self.pending_answer = Some(answer);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

/// A session handle. Holding its lock serializes turns on one thread.
pub type SessionHandle = Arc<Mutex<ConversationState>>;

/// Sessions keyed by thread id.
///
/// Clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `thread_id`, creating it on first use.
    pub async fn acquire(&self, thread_id: &str) -> SessionHandle {
        if let Some(session) = self.sessions.read().await.get(thread_id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                debug!(thread_id, "session created");
                Arc::new(Mutex::new(ConversationState::new(thread_id)))
            })
            .clone()
    }

    /// Snapshot of a thread's history. Waits for a turn in flight to finish.
    pub async fn history(&self, thread_id: &str) -> Option<Vec<Turn>> {
        let session = self.sessions.read().await.get(thread_id).cloned()?;
        let state = session.lock().await;
        Some(state.history().to_vec())
    }

    pub async fn contains(&self, thread_id: &str) -> bool {
        self.sessions.read().await.contains_key(thread_id)
    }

    pub async fn remove(&self, thread_id: &str) -> bool {
        self.sessions.write().await.remove(thread_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions idle for at least `ttl`. Returns the number evicted.
    ///
    /// A session whose handle is held outside the registry is kept: a caller
    /// between [`acquire`](Self::acquire) and locking, or a turn in flight.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(state) => state.idle_for() < ttl,
                Err(_) => true,
            }
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }
}
