//! The session store: single source of truth for who is signed in.
//!
//! `token` and `identity` always move together. `identity` is derived by
//! decoding `token` and is never set on its own. `is_loading` starts true and
//! flips to false exactly once, after the durable slot has been read.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::slot::{SlotOptions, TokenSlot};
use super::token::{decode_identity, Identity};

/// Consistent snapshot of the session, as handed to views and guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub token: Option<String>,
    pub user: Option<Identity>,
    pub is_loading: bool,
}

impl SessionView {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    identity: Option<Identity>,
}

impl SessionState {
    fn set(&mut self, token: &str, identity: Identity) {
        self.token = Some(token.to_string());
        self.identity = Some(identity);
    }

    fn clear(&mut self) {
        self.token = None;
        self.identity = None;
    }
}

struct Inner {
    slot: Box<dyn TokenSlot>,
    state: Mutex<SessionState>,
    loading: watch::Sender<bool>,
}

/// Handle to the session. Cloning shares the same underlying session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store that has not hydrated yet. `is_loading` stays true until
    /// [`SessionStore::hydrate`] runs.
    pub fn new(slot: impl TokenSlot + 'static) -> Self {
        let (loading, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                slot: Box::new(slot),
                state: Mutex::new(SessionState::default()),
                loading,
            }),
        }
    }

    /// Create a store and start hydrating it in the background.
    ///
    /// Must be called from within a tokio runtime. Await [`SessionStore::ready`]
    /// before trusting `token`/`user` for access decisions.
    pub fn open(slot: impl TokenSlot + 'static) -> Self {
        let store = Self::new(slot);
        let handle = store.clone();
        tokio::task::spawn_blocking(move || handle.hydrate());
        store
    }

    /// Read the durable slot once and populate the session from it.
    ///
    /// Runs at most once per store; later calls return immediately.
    pub fn hydrate(&self) {
        let mut state = self.lock();
        if !*self.inner.loading.borrow() {
            return;
        }

        if state.identity.is_some() {
            // A sign-in landed before hydration; it is newer than whatever is stored.
            debug!("Session already established, skipping stored token");
        } else {
            match self.inner.slot.read() {
                Ok(Some(token)) => match decode_identity(&token) {
                    Ok(identity) => {
                        debug!(user_id = %identity.id, "Session restored from storage");
                        state.set(&token, identity);
                    }
                    Err(e) => {
                        debug!(error = %e, "Stored token is unreadable, discarding it");
                        self.erase_slot();
                    }
                },
                Ok(None) => debug!("No stored session"),
                Err(e) => {
                    warn!(error = %e, "Failed to read stored session, discarding it");
                    self.erase_slot();
                }
            }
        }

        self.inner.loading.send_replace(false);
    }

    /// Wait until hydration has finished.
    pub async fn ready(&self) {
        let mut rx = self.inner.loading.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|loading| !*loading).await;
    }

    /// Accept a credential issued by the backend.
    ///
    /// Returns the decoded identity, or `None` if the credential could not be
    /// decoded. A rejected credential leaves the current session untouched.
    pub fn sign_in(&self, token: &str) -> Option<Identity> {
        let identity = match decode_identity(token) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Failed to decode token on sign-in");
                return None;
            }
        };

        let mut state = self.lock();
        state.set(token, identity.clone());
        if let Err(e) = self.inner.slot.write(token, SlotOptions::session()) {
            warn!(error = %e, "Failed to persist session");
        }
        info!(user_id = %identity.id, "Signed in");
        Some(identity)
    }

    /// Forget the current session, in memory and in storage.
    pub fn sign_out(&self) {
        let mut state = self.lock();
        if state.identity.is_some() {
            info!("Signed out");
        }
        state.clear();
        self.erase_slot();
    }

    /// [`SessionStore::sign_in`] on the blocking pool.
    ///
    /// Slot writes may block (a keychain can prompt the user), so async
    /// callers use this instead of holding up the runtime thread.
    pub async fn sign_in_async(&self, token: &str) -> Option<Identity> {
        let store = self.clone();
        let token = token.to_string();
        match tokio::task::spawn_blocking(move || store.sign_in(&token)).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Sign-in task failed");
                self.user()
            }
        }
    }

    /// [`SessionStore::sign_out`] on the blocking pool.
    pub async fn sign_out_async(&self) {
        let store = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || store.sign_out()).await {
            warn!(error = %e, "Sign-out task failed");
        }
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn user(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.inner.loading.borrow()
    }

    /// Snapshot of token, user, and loading flag taken under one lock.
    pub fn current(&self) -> SessionView {
        let state = self.lock();
        SessionView {
            token: state.token.clone(),
            user: state.identity.clone(),
            is_loading: self.is_loading(),
        }
    }

    fn erase_slot(&self) {
        if let Err(e) = self.inner.slot.erase() {
            warn!(error = %e, "Failed to erase stored session");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::slot::{MemorySlot, StoredToken};
    use crate::auth::token::fake_token;
    use serde_json::json;

    fn token_for(id: &str, email: &str) -> String {
        fake_token(json!({"id": id, "email": email}))
    }

    fn seeded(token: &str) -> Arc<MemorySlot> {
        Arc::new(MemorySlot::with_record(StoredToken::new(token, SlotOptions::session())))
    }

    #[test]
    fn test_initial_state_empty_slot() {
        let store = SessionStore::new(MemorySlot::new());
        assert!(store.is_loading());
        assert_eq!(store.token(), None);

        store.hydrate();
        assert_eq!(
            store.current(),
            SessionView { token: None, user: None, is_loading: false }
        );
    }

    #[tokio::test]
    async fn test_open_hydrates_in_background() {
        let token = token_for("u1", "a@example.com");
        let store = SessionStore::open(seeded(&token));
        store.ready().await;

        assert!(!store.is_loading());
        assert_eq!(store.token().as_deref(), Some(token.as_str()));
        assert_eq!(
            store.user(),
            Some(Identity { id: "u1".into(), email: "a@example.com".into() })
        );
    }

    #[test]
    fn test_hydration_corrupt_token_erases_slot() {
        let slot = seeded("not-a-valid-token");
        let store = SessionStore::new(slot.clone());
        store.hydrate();

        assert_eq!(store.token(), None);
        assert_eq!(store.user(), None);
        assert!(!store.is_loading());
        assert_eq!(slot.load().unwrap(), None);
    }

    #[test]
    fn test_hydration_corrupt_record_erases_slot() {
        let dir = tempfile::tempdir().unwrap();
        let slot = Arc::new(crate::auth::FileSlot::new(dir.path().to_path_buf()));
        std::fs::write(slot.path(), "{ not json").unwrap();
        assert!(matches!(slot.load(), Err(crate::auth::SlotError::Corrupt(_))));

        let store = SessionStore::new(slot.clone());
        store.hydrate();

        assert_eq!(store.current(), SessionView { token: None, user: None, is_loading: false });
        assert!(!slot.path().exists());
        assert_eq!(slot.load().unwrap(), None);
    }

    #[test]
    fn test_hydration_runs_once() {
        let slot = Arc::new(MemorySlot::new());
        let store = SessionStore::new(slot.clone());
        store.hydrate();

        // A record appearing later must not be picked up by a second call
        slot.write(&token_for("u9", "late@example.com"), SlotOptions::session()).unwrap();
        store.hydrate();

        assert_eq!(store.user(), None);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_sign_in_replaces_previous_identity() {
        let slot = Arc::new(MemorySlot::new());
        let store = SessionStore::new(slot.clone());
        store.hydrate();

        let first = token_for("u1", "a@example.com");
        let second = token_for("u2", "b@example.com");
        assert!(store.sign_in(&first).is_some());
        assert!(store.sign_in(&second).is_some());

        assert_eq!(store.token().as_deref(), Some(second.as_str()));
        assert_eq!(
            store.user(),
            Some(Identity { id: "u2".into(), email: "b@example.com".into() })
        );
        assert_eq!(slot.read().unwrap().as_deref(), Some(second.as_str()));
    }

    #[test]
    fn test_sign_in_persists_with_session_options() {
        let slot = Arc::new(MemorySlot::new());
        let store = SessionStore::new(slot.clone());
        store.sign_in(&token_for("u1", "a@example.com"));

        let record = slot.load().unwrap().unwrap();
        assert!(record.secure);
        assert!(record.expires_at > chrono::Utc::now() + chrono::Duration::days(6));
    }

    #[test]
    fn test_sign_in_rejects_malformed_token() {
        let slot = Arc::new(MemorySlot::new());
        let store = SessionStore::new(slot.clone());
        store.hydrate();

        let good = token_for("u1", "a@example.com");
        store.sign_in(&good);
        assert_eq!(store.sign_in("garbage"), None);

        assert_eq!(store.token().as_deref(), Some(good.as_str()));
        assert_eq!(store.user().map(|u| u.id), Some("u1".to_string()));
        assert_eq!(slot.read().unwrap().as_deref(), Some(good.as_str()));
    }

    #[test]
    fn test_sign_out_is_idempotent() {
        let slot = Arc::new(MemorySlot::new());
        let store = SessionStore::new(slot.clone());
        store.hydrate();

        store.sign_out();
        let before = store.current();
        store.sign_out();
        assert_eq!(store.current(), before);

        store.sign_in(&token_for("u1", "a@example.com"));
        store.sign_out();
        assert_eq!(store.token(), None);
        assert_eq!(store.user(), None);
        assert_eq!(slot.load().unwrap(), None);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_round_trip_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let token = token_for("u1", "a@example.com");

        let first = SessionStore::open(crate::auth::FileSlot::new(dir.path().to_path_buf()));
        first.ready().await;
        first.sign_in(&token);
        let expected = first.user();
        drop(first);

        let reloaded = SessionStore::open(crate::auth::FileSlot::new(dir.path().to_path_buf()));
        reloaded.ready().await;
        assert_eq!(reloaded.user(), expected);
        assert_eq!(reloaded.token().as_deref(), Some(token.as_str()));
    }

    #[test]
    fn test_sign_in_before_hydration_wins() {
        let stale = token_for("old", "old@example.com");
        let fresh = token_for("new", "new@example.com");
        let store = SessionStore::new(seeded(&stale));

        store.sign_in(&fresh);
        store.hydrate();

        assert_eq!(store.user().map(|u| u.id), Some("new".to_string()));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_async_sign_in_and_out_use_the_slot() {
        let slot = Arc::new(MemorySlot::new());
        let store = SessionStore::open(slot.clone());
        store.ready().await;

        let token = token_for("u1", "a@example.com");
        let user = store.sign_in_async(&token).await;
        assert_eq!(user.map(|u| u.email), Some("a@example.com".to_string()));
        assert_eq!(slot.read().unwrap().as_deref(), Some(token.as_str()));

        assert_eq!(store.sign_in_async("garbage").await, None);
        assert_eq!(store.token().as_deref(), Some(token.as_str()));

        store.sign_out_async().await;
        assert_eq!(store.current(), SessionView { token: None, user: None, is_loading: false });
        assert_eq!(slot.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_ready_after_hydration_returns_immediately() {
        let store = SessionStore::new(MemorySlot::new());
        store.hydrate();
        store.ready().await;
        assert!(!store.current().is_loading);
    }
}
