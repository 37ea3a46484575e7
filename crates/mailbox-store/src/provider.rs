//! Backend collaborator contracts.
//!
//! The client never talks to a concrete backend directly: it receives a
//! [`BackendHandle`] from a [`BackendConnector`] and goes through the two
//! service traits it carries.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use mailbox_shared::{BackendConfig, Identity, MessageId, NewMessage};

use crate::error::BackendError;
use crate::models::StoredDocument;
use crate::path::CollectionPath;

// ---------------------------------------------------------------------------
// Service traits
// ---------------------------------------------------------------------------

/// Hosted identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, BackendError>;

    async fn sign_in_with_token(&self, token: &str) -> Result<Identity, BackendError>;

    /// The identity currently active on this connection, if any.
    fn current_identity(&self) -> Option<Identity>;

    /// Observe identity changes.  Dropping the receiver unsubscribes.
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;
}

/// Hosted document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a record in `path` and return the id the backend assigned.
    async fn create_record(
        &self,
        path: &CollectionPath,
        record: &NewMessage,
    ) -> Result<MessageId, BackendError>;

    /// Start a live subscription on `path`.
    ///
    /// The first event carries the current contents; every later change
    /// delivers the full collection again.
    fn subscribe(&self, path: &CollectionPath) -> Result<Subscription, BackendError>;
}

/// Opens a connection to the backend for a given configuration.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, config: &BackendConfig) -> Result<BackendHandle, BackendError>;
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One delivery from a live subscription.
pub type SnapshotEvent = Result<Vec<StoredDocument>, BackendError>;

/// Receiving end of a live collection subscription.
///
/// The subscription stays open until this value is dropped.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SnapshotEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next snapshot.  `None` once the backend closed the stream.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// BackendHandle
// ---------------------------------------------------------------------------

/// A connected backend client.
///
/// Cheap to clone; every clone refers to the same underlying connection.
#[derive(Clone)]
pub struct BackendHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl BackendHandle {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Arc::new(HandleInner { identity, store }),
        }
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.identity
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    /// `true` when both handles share one connection.
    pub fn same_connection(&self, other: &BackendHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("connection", &Arc::as_ptr(&self.inner))
            .finish()
    }
}
