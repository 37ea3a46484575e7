//! Identity handling.
//!
//! Sign-in happens twice at most: once at startup (best effort, failures are
//! only logged) and lazily on the send path, where a failure aborts the send
//! and is shown to the user.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use mailbox_shared::Identity;
use mailbox_store::{codes, BackendError};

use crate::error::{MailboxError, Result};
use crate::session::BackendClientManager;

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    /// The sign-in method is disabled for the project.
    ConfigurationNotEnabled,
    /// The current host is not in the project's authorized domains.
    DomainNotAuthorized,
    NetworkUnreachable,
    Unknown,
}

/// User-facing explanation of a sign-in failure.
///
/// Advisory only: callers branch on success or failure, never on the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDiagnostic {
    pub kind: AuthFailureKind,
    pub code: String,
    pub message: String,
    pub reason: Option<String>,
    pub action: Option<String>,
}

pub fn classify_auth_error(error: &BackendError) -> AuthDiagnostic {
    let (kind, message, reason, action) = match error.code() {
        codes::OPERATION_NOT_ALLOWED | codes::ADMIN_RESTRICTED_OPERATION => (
            AuthFailureKind::ConfigurationNotEnabled,
            "Anonymous sign-in is not enabled for this project.",
            Some("The identity provider rejected anonymous sign-in."),
            Some("Enable the anonymous sign-in method in the backend console."),
        ),
        codes::UNAUTHORIZED_DOMAIN => (
            AuthFailureKind::DomainNotAuthorized,
            "This site is not allowed to sign in.",
            Some("The current domain is missing from the authorized domains list."),
            Some("Add this domain to the project's authorized domains."),
        ),
        codes::NETWORK_REQUEST_FAILED => (
            AuthFailureKind::NetworkUnreachable,
            "Could not reach the sign-in service.",
            Some("The network request to the identity provider failed."),
            Some("Check the connection and try again."),
        ),
        _ => (
            AuthFailureKind::Unknown,
            "Sign-in ran into a problem, please refresh and try again.",
            None,
            None,
        ),
    };

    AuthDiagnostic {
        kind,
        code: error.code().to_string(),
        message: message.to_string(),
        reason: reason.map(str::to_string),
        action: action.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// Tracks the signed-in identity on the process's backend connection.
#[derive(Clone)]
pub struct AuthSession {
    manager: BackendClientManager,
}

impl AuthSession {
    pub fn new(manager: BackendClientManager) -> Self {
        Self { manager }
    }

    /// Startup sign-in: exchange `token` if one was injected, otherwise sign
    /// in anonymously unless an identity is already active.
    ///
    /// Never fails.  Errors are logged and leave the identity absent.
    pub async fn start(&self, token: Option<&str>) -> Option<Identity> {
        let ready = match self.manager.ready() {
            Ok(ready) => ready,
            Err(e) => {
                debug!(error = %e, "Skipping startup sign-in");
                return None;
            }
        };
        let provider = ready.handle.identity();

        let result = match token {
            Some(token) => provider.sign_in_with_token(token).await,
            None => match provider.current_identity() {
                Some(identity) => return Some(identity),
                None => provider.sign_in_anonymously().await,
            },
        };

        match result {
            Ok(identity) => {
                info!(
                    user = identity.user_id.short(),
                    anonymous = identity.anonymous,
                    "Signed in"
                );
                Some(identity)
            }
            Err(e) => {
                let diagnostic = classify_auth_error(&e);
                warn!(
                    code = %diagnostic.code,
                    kind = ?diagnostic.kind,
                    error = %e,
                    "Startup sign-in failed"
                );
                None
            }
        }
    }

    /// The active identity, if any.
    pub fn current(&self) -> Option<Identity> {
        self.manager
            .ready()
            .ok()
            .and_then(|ready| ready.handle.identity().current_identity())
    }

    /// Identity change notifications, once the backend is ready.
    pub fn watch(&self) -> Option<watch::Receiver<Option<Identity>>> {
        self.manager
            .ready()
            .ok()
            .map(|ready| ready.handle.identity().watch_identity())
    }

    /// Return the active identity, signing in anonymously if there is none.
    pub async fn ensure_signed_in(&self) -> Result<Identity> {
        let ready = self.manager.ready()?;
        let provider = ready.handle.identity();

        if let Some(identity) = provider.current_identity() {
            return Ok(identity);
        }

        match provider.sign_in_anonymously().await {
            Ok(identity) => {
                info!(user = identity.user_id.short(), "Signed in anonymously on demand");
                Ok(identity)
            }
            Err(e) => {
                let diagnostic = classify_auth_error(&e);
                warn!(
                    code = %diagnostic.code,
                    kind = ?diagnostic.kind,
                    error = %e,
                    "Anonymous sign-in failed"
                );
                Err(MailboxError::AuthFailed(diagnostic))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailbox_shared::UserId;
    use mailbox_store::IdentityProvider;

    use crate::testing::{idle_manager, ready_manager};

    #[test]
    fn test_classify_known_codes() {
        let cases = [
            (codes::OPERATION_NOT_ALLOWED, AuthFailureKind::ConfigurationNotEnabled),
            (codes::ADMIN_RESTRICTED_OPERATION, AuthFailureKind::ConfigurationNotEnabled),
            (codes::UNAUTHORIZED_DOMAIN, AuthFailureKind::DomainNotAuthorized),
            (codes::NETWORK_REQUEST_FAILED, AuthFailureKind::NetworkUnreachable),
        ];
        for (code, kind) in cases {
            let diagnostic = classify_auth_error(&BackendError::new(code, "x"));
            assert_eq!(diagnostic.kind, kind, "code {code}");
            assert!(diagnostic.action.is_some());
        }
    }

    #[test]
    fn test_classify_unknown_code_is_generic() {
        let diagnostic = classify_auth_error(&BackendError::new("auth/internal-error", "boom"));
        assert_eq!(diagnostic.kind, AuthFailureKind::Unknown);
        assert_eq!(diagnostic.code, "auth/internal-error");
        assert!(diagnostic.reason.is_none());
    }

    #[tokio::test]
    async fn test_start_signs_in_anonymously() {
        let (manager, backend) = ready_manager().await;
        let auth = AuthSession::new(manager);

        let identity = auth.start(None).await.unwrap();
        assert!(identity.anonymous);
        assert_eq!(auth.current(), Some(identity));
        assert_eq!(backend.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn test_start_reuses_active_identity() {
        let (manager, backend) = ready_manager().await;
        backend.sign_in_anonymously().await.unwrap();
        let auth = AuthSession::new(manager);

        assert!(auth.start(None).await.is_some());
        assert_eq!(backend.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn test_start_uses_custom_token() {
        let (manager, backend) = ready_manager().await;
        backend.accept_token("secret-token", UserId("operator".into()));
        let auth = AuthSession::new(manager);

        let identity = auth.start(Some("secret-token")).await.unwrap();
        assert!(!identity.anonymous);
        assert_eq!(identity.user_id, UserId("operator".into()));
    }

    #[tokio::test]
    async fn test_start_failure_is_swallowed() {
        let (manager, backend) = ready_manager().await;
        backend.fail_next_sign_in(BackendError::new(codes::OPERATION_NOT_ALLOWED, "disabled"));
        let auth = AuthSession::new(manager);

        assert!(auth.start(None).await.is_none());
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_start_without_backend_does_nothing() {
        let auth = AuthSession::new(idle_manager());
        assert!(auth.start(None).await.is_none());
        assert!(auth.watch().is_none());
    }

    #[tokio::test]
    async fn test_ensure_signed_in_creates_identity_lazily() {
        let (manager, backend) = ready_manager().await;
        let auth = AuthSession::new(manager);

        let first = auth.ensure_signed_in().await.unwrap();
        let second = auth.ensure_signed_in().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_signed_in_surfaces_classified_failure() {
        let (manager, backend) = ready_manager().await;
        backend.fail_next_sign_in(BackendError::new(codes::UNAUTHORIZED_DOMAIN, "nope"));
        let auth = AuthSession::new(manager);

        match auth.ensure_signed_in().await {
            Err(MailboxError::AuthFailed(diagnostic)) => {
                assert_eq!(diagnostic.kind, AuthFailureKind::DomainNotAuthorized);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_signed_in_requires_ready_backend() {
        let auth = AuthSession::new(idle_manager());
        assert_eq!(
            auth.ensure_signed_in().await.unwrap_err(),
            MailboxError::BackendUnavailable
        );
    }

    #[tokio::test]
    async fn test_watch_reports_identity_changes() {
        let (manager, backend) = ready_manager().await;
        let auth = AuthSession::new(manager);
        let mut rx = auth.watch().unwrap();

        auth.ensure_signed_in().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        backend.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}
