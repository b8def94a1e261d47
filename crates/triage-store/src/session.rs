//! Concurrency-safe keyed store for session state.
//!
//! Replaces the classic "global mutable dict keyed by session id" with a
//! sharded concurrent map plus a per-session turn lock.  The lock is what
//! upholds the template invariant: two turns racing through read-modify-write
//! on the same session could otherwise both observe "no pending template".
//! Distinct sessions never contend.
//!
//! No expiry is implemented: state lives for the lifetime of the process,
//! matching the reference behavior.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::state::SessionState;

/// In-memory session state store.
///
/// Creation-on-absence is the orchestrator's job; [`SessionStateStore::get`]
/// simply reports absence.
#[derive(Debug, Default)]
pub struct SessionStateStore {
    states: DashMap<String, SessionState>,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a clone of the stored state for `session_id`, if any.
    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        self.states.get(session_id).map(|entry| entry.clone())
    }

    /// Store (overwrite) the state for `session_id`.
    pub fn put(&self, session_id: &str, state: SessionState) {
        debug!(session_id, intent = %state.intent, node = %state.node, "session state stored");
        self.states.insert(session_id.to_owned(), state);
    }

    /// The mutex serializing turns for `session_id`.
    ///
    /// The orchestrator holds this for the full duration of a turn.  Locks
    /// are created on first use and shared by handle thereafter.
    pub fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of sessions with stored state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_absent_session_returns_none() {
        let store = SessionStateStore::new();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = SessionStateStore::new();
        let mut state = SessionState::new("hello");
        state.intent = "greeting".into();

        store.put("s1", state);
        let loaded = store.get("s1").expect("stored state");
        assert_eq!(loaded.user_input, "hello");
        assert_eq!(loaded.intent, "greeting");
    }

    #[test]
    fn put_overwrites_previous_state() {
        let store = SessionStateStore::new();
        store.put("s1", SessionState::new("first"));
        store.put("s1", SessionState::new("second"));
        assert_eq!(store.get("s1").unwrap().user_input, "second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn turn_lock_is_shared_per_session() {
        let store = SessionStateStore::new();
        let a = store.turn_lock("s1");
        let b = store.turn_lock("s1");
        let other = store.turn_lock("s2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn turn_lock_serializes_same_session() {
        let store = SessionStateStore::new();
        let lock = store.turn_lock("s1");

        let guard = lock.lock().await;
        // A second turn on the same session must wait.
        assert!(store.turn_lock("s1").try_lock().is_err());
        // A different session proceeds immediately.
        assert!(store.turn_lock("s2").try_lock().is_ok());
        drop(guard);
        assert!(store.turn_lock("s1").try_lock().is_ok());
    }
}
