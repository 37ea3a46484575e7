//! Backend connection lifecycle.
//!
//! [`BackendClientManager`] moves through
//! `Uninitialized -> Initializing -> Ready | Failed` exactly once per
//! process.  `Failed` is terminal: a fresh start is required to retry.
//! Every other component asks the manager for a [`ReadyBackend`] and refuses
//! to operate when it cannot get one.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{error, info};

use mailbox_shared::{BackendConfig, TenantId};
use mailbox_store::{BackendConnector, BackendError, BackendHandle};

use crate::config::ConfigError;
use crate::error::{MailboxError, Result};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A connected backend and the namespace its data lives under.
#[derive(Debug, Clone)]
pub struct ReadyBackend {
    pub handle: BackendHandle,
    pub tenant: TenantId,
}

/// Why initialization failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitFailure {
    #[error("{0}")]
    Config(ConfigError),

    #[error("could not connect to backend: {0}")]
    Connect(BackendError),
}

impl InitFailure {
    /// Human-readable text for the blocking notice.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Config(e) => format!(
                "Backend configuration is missing ({}). Set {} and restart.",
                e.missing()
                    .iter()
                    .map(|k| k.field())
                    .collect::<Vec<_>>()
                    .join(", "),
                e.env_hint()
            ),
            Self::Connect(e) => format!("Backend initialization failed: {e}"),
        }
    }
}

impl From<InitFailure> for MailboxError {
    fn from(failure: InitFailure) -> Self {
        match failure {
            InitFailure::Config(e) => MailboxError::ConfigInvalid(e),
            InitFailure::Connect(_) => MailboxError::BackendInitFailed(failure.diagnostic()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BackendState {
    Uninitialized,
    Initializing,
    Ready(ReadyBackend),
    Failed(InitFailure),
}

impl BackendState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Process-wide table of open backend connections, keyed by configuration.
///
/// Asking twice for the same configuration returns the same handle, so
/// duplicate mounting never opens a second connection.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    connections: Arc<Mutex<HashMap<String, BackendHandle>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_connect(
        &self,
        config: &BackendConfig,
        connector: &dyn BackendConnector,
    ) -> std::result::Result<BackendHandle, BackendError> {
        // Held across the connect so concurrent callers cannot both connect.
        let mut connections = self.connections.lock().await;
        let key = config.connection_key();

        if let Some(existing) = connections.get(&key) {
            info!(key = %key, "Reusing existing backend connection");
            return Ok(existing.clone());
        }

        let handle = connector.connect(config).await?;
        connections.insert(key, handle.clone());
        Ok(handle)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns the backend connection for this process.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BackendClientManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    registry: BackendRegistry,
    connector: Arc<dyn BackendConnector>,
    state_tx: watch::Sender<BackendState>,
    once: OnceCell<()>,
}

impl BackendClientManager {
    pub fn new(registry: BackendRegistry, connector: Arc<dyn BackendConnector>) -> Self {
        let (state_tx, _) = watch::channel(BackendState::Uninitialized);
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                connector,
                state_tx,
                once: OnceCell::new(),
            }),
        }
    }

    /// Run initialization.  Only the first call does any work; later calls
    /// return the state it settled in.
    pub async fn initialize(
        &self,
        config: &std::result::Result<BackendConfig, ConfigError>,
        tenant_override: Option<&str>,
    ) -> BackendState {
        self.inner
            .once
            .get_or_init(|| self.run_initialization(config, tenant_override))
            .await;
        self.state()
    }

    async fn run_initialization(
        &self,
        config: &std::result::Result<BackendConfig, ConfigError>,
        tenant_override: Option<&str>,
    ) {
        let config = match config {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "Backend configuration is missing, not connecting");
                self.set_state(BackendState::Failed(InitFailure::Config(e.clone())));
                return;
            }
        };

        self.set_state(BackendState::Initializing);

        match self
            .inner
            .registry
            .get_or_connect(config, self.inner.connector.as_ref())
            .await
        {
            Ok(handle) => {
                let tenant = resolve_tenant(tenant_override, Some(config));
                info!(tenant = %tenant, project = %config.project_id, "Backend ready");
                self.set_state(BackendState::Ready(ReadyBackend { handle, tenant }));
            }
            Err(e) => {
                error!(error = %e, "Backend initialization failed");
                self.set_state(BackendState::Failed(InitFailure::Connect(e)));
            }
        }
    }

    fn set_state(&self, state: BackendState) {
        self.inner.state_tx.send_replace(state);
    }

    pub fn state(&self) -> BackendState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BackendState> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state_tx.borrow().is_ready()
    }

    /// The ready backend, or the error dependent features must surface.
    pub fn ready(&self) -> Result<ReadyBackend> {
        match self.state() {
            BackendState::Ready(ready) => Ok(ready),
            BackendState::Failed(failure) => Err(failure.into()),
            BackendState::Uninitialized | BackendState::Initializing => {
                Err(MailboxError::BackendUnavailable)
            }
        }
    }
}

/// Explicit override, else the project id, else the fixed default.
pub fn resolve_tenant(tenant_override: Option<&str>, config: Option<&BackendConfig>) -> TenantId {
    tenant_override
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| {
            config
                .map(|c| c.project_id.as_str())
                .filter(|id| !id.is_empty())
        })
        .map(TenantId::new)
        .unwrap_or_default()
}
