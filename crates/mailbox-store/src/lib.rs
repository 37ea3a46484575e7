//! # mailbox-store
//!
//! Contracts for the hosted backend the mailbox talks to, plus an in-process
//! implementation of them.
//!
//! The hosted identity provider and document store are consumed only through
//! the [`IdentityProvider`], [`DocumentStore`] and [`BackendConnector`]
//! traits.  [`MemoryBackend`] implements all three in memory so the client can
//! run locally and be tested without network access.

pub mod memory;
pub mod models;
pub mod path;
pub mod provider;

mod error;

pub use error::{codes, BackendError};
pub use memory::{MemoryBackend, MemoryConnector, WriteMode};
pub use models::{StoredDocument, StoredFields};
pub use path::CollectionPath;
pub use provider::{
    BackendConnector, BackendHandle, DocumentStore, IdentityProvider, SnapshotEvent, Subscription,
};
