//! In-process backend.
//!
//! [`MemoryBackend`] keeps collections in a `HashMap` and pushes a full
//! snapshot to every open subscription after each write, the same delivery
//! model the hosted store uses.  Failure injection hooks (`fail_next_sign_in`,
//! [`WriteMode`], `fail_subscriptions`) let callers exercise the client's
//! error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};
use uuid::Uuid;

use mailbox_shared::{BackendConfig, Identity, MessageId, NewMessage, UserId};

use crate::error::{codes, BackendError};
use crate::models::StoredDocument;
use crate::path::CollectionPath;
use crate::provider::{
    BackendConnector, BackendHandle, DocumentStore, IdentityProvider, SnapshotEvent, Subscription,
};

/// How `create_record` behaves.
#[derive(Debug, Clone, Default)]
pub enum WriteMode {
    /// Commit immediately.
    #[default]
    Normal,
    /// Reject every write with the given error.
    Fail(BackendError),
    /// Park writes until [`MemoryBackend::release_held_writes`] is called,
    /// then commit them.
    Hold,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<CollectionPath, Vec<StoredDocument>>,
    subscribers: HashMap<CollectionPath, Vec<mpsc::UnboundedSender<SnapshotEvent>>>,
    tokens: HashMap<String, UserId>,
    sign_in_failure: Option<BackendError>,
    write_mode: WriteMode,
    held_writes: Vec<oneshot::Sender<()>>,
    sign_in_calls: usize,
    write_calls: usize,
}

/// In-memory identity provider and document store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
    identity_tx: Arc<watch::Sender<Option<Identity>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            identity_tx: Arc::new(identity_tx),
        }
    }

    /// Wrap this backend in a handle usable by the client.
    pub fn handle(&self) -> BackendHandle {
        BackendHandle::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Identity controls
    // ------------------------------------------------------------------

    /// Accept `token` in `sign_in_with_token`, signing in as `user`.
    pub fn accept_token(&self, token: impl Into<String>, user: UserId) {
        self.state().tokens.insert(token.into(), user);
    }

    /// Make the next sign-in attempt of either kind fail with `error`.
    pub fn fail_next_sign_in(&self, error: BackendError) {
        self.state().sign_in_failure = Some(error);
    }

    /// Drop the active identity, notifying identity watchers.
    pub fn sign_out(&self) {
        self.identity_tx.send_replace(None);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.state().sign_in_calls
    }

    // ------------------------------------------------------------------
    // Store controls
    // ------------------------------------------------------------------

    pub fn set_write_mode(&self, mode: WriteMode) {
        self.state().write_mode = mode;
    }

    /// Let every parked write commit.
    pub fn release_held_writes(&self) {
        let held = std::mem::take(&mut self.state().held_writes);
        for tx in held {
            let _ = tx.send(());
        }
    }

    pub fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    /// Insert a raw document, bypassing the write path.  Used to seed data
    /// that does not follow the current record shape.
    pub fn insert_raw(&self, path: &CollectionPath, id: &str, data: serde_json::Value) {
        let mut state = self.state();
        state
            .collections
            .entry(path.clone())
            .or_default()
            .push(StoredDocument {
                id: MessageId(id.to_string()),
                data,
            });
        notify(&mut state, path);
    }

    /// Deliver `error` to every open subscription on `path` and close them.
    pub fn fail_subscriptions(&self, path: &CollectionPath, error: BackendError) {
        let subscribers = self.state().subscribers.remove(path).unwrap_or_default();
        for tx in subscribers {
            let _ = tx.send(Err(error.clone()));
        }
    }

    /// Number of subscriptions on `path` whose receiver is still alive.
    pub fn subscriber_count(&self, path: &CollectionPath) -> usize {
        let mut state = self.state();
        match state.subscribers.get_mut(path) {
            Some(subs) => {
                subs.retain(|tx| !tx.is_closed());
                subs.len()
            }
            None => 0,
        }
    }

    pub fn documents(&self, path: &CollectionPath) -> Vec<StoredDocument> {
        self.state()
            .collections
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn commit(&self, path: &CollectionPath, record: &NewMessage) -> Result<MessageId, BackendError> {
        let data = serde_json::to_value(record)
            .map_err(|e| BackendError::new(codes::FAILED_PRECONDITION, e.to_string()))?;
        let id = MessageId(Uuid::new_v4().simple().to_string());

        let mut state = self.state();
        state
            .collections
            .entry(path.clone())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                data,
            });
        notify(&mut state, path);

        debug!(id = %id, path = %path, "record committed");
        Ok(id)
    }

    fn begin_sign_in(&self) -> Result<(), BackendError> {
        let mut state = self.state();
        state.sign_in_calls += 1;
        match state.sign_in_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Push the current contents of `path` to its live subscribers, dropping any
/// whose receiver has gone away.
fn notify(state: &mut Inner, path: &CollectionPath) {
    let snapshot = state.collections.get(path).cloned().unwrap_or_default();
    if let Some(subs) = state.subscribers.get_mut(path) {
        subs.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn sign_in_anonymously(&self) -> Result<Identity, BackendError> {
        self.begin_sign_in()?;
        let identity = Identity {
            user_id: UserId(Uuid::new_v4().simple().to_string()),
            anonymous: true,
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<Identity, BackendError> {
        self.begin_sign_in()?;
        let user = self.state().tokens.get(token).cloned().ok_or_else(|| {
            BackendError::new(codes::INVALID_CUSTOM_TOKEN, "custom token not recognised")
        })?;
        let identity = Identity {
            user_id: user,
            anonymous: false,
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn create_record(
        &self,
        path: &CollectionPath,
        record: &NewMessage,
    ) -> Result<MessageId, BackendError> {
        let parked = {
            let mut state = self.state();
            state.write_calls += 1;
            if self.identity_tx.borrow().is_none() {
                return Err(BackendError::new(
                    codes::PERMISSION_DENIED,
                    "writes require a signed-in user",
                ));
            }
            match state.write_mode.clone() {
                WriteMode::Normal => None,
                WriteMode::Fail(error) => return Err(error),
                WriteMode::Hold => {
                    let (tx, rx) = oneshot::channel();
                    state.held_writes.push(tx);
                    Some(rx)
                }
            }
        };

        if let Some(rx) = parked {
            // A dropped sender still releases the write.
            let _ = rx.await;
        }

        self.commit(path, record)
    }

    fn subscribe(&self, path: &CollectionPath) -> Result<Subscription, BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        let snapshot = state.collections.get(path).cloned().unwrap_or_default();
        let _ = tx.send(Ok(snapshot));
        state.subscribers.entry(path.clone()).or_default().push(tx);
        debug!(path = %path, "subscription opened");
        Ok(Subscription::new(rx))
    }
}

// ---------------------------------------------------------------------------
// MemoryConnector
// ---------------------------------------------------------------------------

/// Connector that hands out handles onto one shared [`MemoryBackend`].
///
/// Counts connection attempts so callers can verify that a connection is
/// only opened once per configuration.
pub struct MemoryConnector {
    backend: MemoryBackend,
    connects: AtomicUsize,
    failure: Mutex<Option<BackendError>>,
}

impl MemoryConnector {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            connects: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Make every later `connect` fail with `error`.
    pub fn fail_with(&self, error: BackendError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(&self, config: &BackendConfig) -> Result<BackendHandle, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }
        info!(project = %config.project_id, "connected to in-memory backend");
        Ok(self.backend.handle())
    }
}
