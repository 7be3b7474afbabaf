use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Lifecycle of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Receiving chunks
    Active,
    /// Finish pipeline running
    Finishing,
    /// Finish pipeline delivered its artifact
    Closed,
    /// Finish pipeline failed (or its task panicked)
    Failed,
}

/// Process-wide registry of capture sessions.
///
/// Sessions are owned by exactly one connection; the registry exists so that
/// a second `start` with a taken identifier, or a second `stop` racing the
/// finish pipeline, can be rejected instead of double-running, and so that a
/// crashed finish task leaves an observable (logged) terminal state.
/// Only in-flight sessions are retained: terminal entries are evicted as
/// soon as their outcome is recorded, freeing the identifier for reuse.
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Claim a session identifier. Fails if it is already in use.
    pub async fn register(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            bail!("session {} already exists", session_id);
        }
        sessions.insert(session_id.to_string(), SessionState::Active);
        Ok(())
    }

    pub async fn state(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.read().await.get(session_id).copied()
    }

    /// Atomically transition Active -> Finishing. Rejects a redundant `stop`
    /// (the session is already finishing or terminal) and unknown sessions.
    pub async fn begin_finish(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(SessionState::Active) => {
                sessions.insert(session_id.to_string(), SessionState::Finishing);
                Ok(())
            }
            Some(state) => bail!(
                "session {} cannot be stopped (state: {:?})",
                session_id,
                state
            ),
            None => bail!("unknown session {}", session_id),
        }
    }

    /// Record the terminal state of a finish pipeline and evict the entry.
    /// A redundant `stop` arriving after eviction fails as an unknown
    /// session rather than as a duplicate.
    pub async fn complete(&self, session_id: &str, state: SessionState) {
        self.sessions.write().await.remove(session_id);
        info!("[{}] session {:?}", session_id, state);
    }

    /// Forget a session whose connection dropped without `stop`. Persisted
    /// chunks stay on disk until the orphan sweeper reclaims them.
    pub async fn remove_abandoned(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(session_id) == Some(&SessionState::Active) {
            sessions.remove(session_id);
            info!("[{}] session abandoned without stop", session_id);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
