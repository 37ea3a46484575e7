//! Fixtures shared by the unit tests.

use std::sync::Arc;

use mailbox_shared::BackendConfig;
use mailbox_store::{MemoryBackend, MemoryConnector};

use crate::session::{BackendClientManager, BackendRegistry};

pub fn test_config() -> BackendConfig {
    BackendConfig {
        api_key: "key".into(),
        auth_domain: "demo.example.com".into(),
        project_id: "demo-project".into(),
        storage_bucket: "demo.bucket".into(),
        messaging_sender_id: "42".into(),
        app_id: "1:42:web:abc".into(),
        measurement_id: None,
    }
}

/// A manager already in the `Ready` state over a fresh in-memory backend.
pub async fn ready_manager() -> (BackendClientManager, MemoryBackend) {
    let backend = MemoryBackend::new();
    let connector = Arc::new(MemoryConnector::new(backend.clone()));
    let manager = BackendClientManager::new(BackendRegistry::new(), connector);
    manager.initialize(&Ok(test_config()), None).await;
    (manager, backend)
}

/// A manager that was never initialized.
pub fn idle_manager() -> BackendClientManager {
    let connector = Arc::new(MemoryConnector::new(MemoryBackend::new()));
    BackendClientManager::new(BackendRegistry::new(), connector)
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
