use thiserror::Error;

/// Error reported by the hosted backend.
///
/// The backend identifies failures with short string codes (for example
/// `auth/unauthorized-domain` or `permission-denied`).  The client classifies
/// these codes for diagnostics; the message is kept for logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Error codes produced by the backend services.
pub mod codes {
    // Identity provider
    pub const OPERATION_NOT_ALLOWED: &str = "auth/operation-not-allowed";
    pub const ADMIN_RESTRICTED_OPERATION: &str = "auth/admin-restricted-operation";
    pub const UNAUTHORIZED_DOMAIN: &str = "auth/unauthorized-domain";
    pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";
    pub const INVALID_CUSTOM_TOKEN: &str = "auth/invalid-custom-token";

    // Document store
    pub const PERMISSION_DENIED: &str = "permission-denied";
    pub const FAILED_PRECONDITION: &str = "failed-precondition";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const UNAUTHENTICATED: &str = "unauthenticated";

    // Connection setup
    pub const INVALID_API_KEY: &str = "app/invalid-api-key";
}
