use thiserror::Error;

use crate::auth::AuthDiagnostic;
use crate::composer::SendDiagnostic;
use crate::config::ConfigError;

/// Errors surfaced by the mailbox client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    /// Configuration could not be resolved.  Fatal for the process.
    #[error("Backend configuration invalid: {0}")]
    ConfigInvalid(#[from] ConfigError),

    /// The backend connection could not be created.  Fatal for the process.
    #[error("Backend initialization failed: {0}")]
    BackendInitFailed(String),

    /// An operation was attempted before the backend became ready.
    #[error("Backend is not ready")]
    BackendUnavailable,

    #[error("Sign-in failed: {}", .0.message)]
    AuthFailed(AuthDiagnostic),

    #[error("Send failed: {}", .0.message)]
    SendFailed(SendDiagnostic),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Message content is empty")]
    EmptyContent,

    #[error("A message is already being sent")]
    SendInFlight,
}

impl MailboxError {
    /// Errors that take down the whole interactive surface.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid(_) | Self::BackendInitFailed(_) | Self::BackendUnavailable
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MailboxError>;
