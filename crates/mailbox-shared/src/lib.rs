//! Types and constants shared by the mailbox store and client crates.

pub mod config;
pub mod constants;
pub mod types;

pub use config::BackendConfig;
pub use types::{Identity, Message, MessageId, NewMessage, TenantId, Theme, UserId, View};
