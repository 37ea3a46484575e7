//! Message composition and submission.
//!
//! A send is bounded by [`ClientSettings::send_timeout`].  The backend call
//! cannot be cancelled, so on timeout the composer abandons its wait and the
//! call keeps running in its own task.  Each send gets an attempt number and
//! a one-shot result channel; once the composer stops listening, a late
//! result from that attempt has nowhere to go and is only logged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use mailbox_shared::constants::{
    ANONYMOUS_NAME, MAX_CONTENT_CHARS, MAX_NAME_CHARS, THEME_PALETTE_SIZE,
};
use mailbox_shared::{MessageId, NewMessage};
use mailbox_store::{codes, BackendError, CollectionPath};

use crate::auth::AuthSession;
use crate::config::ClientSettings;
use crate::error::{MailboxError, Result};
use crate::session::BackendClientManager;

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailureKind {
    PermissionDenied,
    PreconditionFailed,
    Unavailable,
    /// The composer stopped waiting; the write may still land later.
    Timeout,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendDiagnostic {
    pub kind: SendFailureKind,
    pub code: Option<String>,
    pub message: String,
    pub reason: Option<String>,
}

impl SendDiagnostic {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: SendFailureKind::Timeout,
            code: None,
            message: "Sending is taking too long, please try again.".to_string(),
            reason: Some(format!("No response from the backend after {}s.", after.as_secs())),
        }
    }
}

pub fn classify_send_error(error: &BackendError) -> SendDiagnostic {
    // Codes sometimes arrive with a service prefix, e.g. `firestore/unavailable`.
    let code = error.code().rsplit('/').next().unwrap_or_default();
    let (kind, message, reason) = match code {
        codes::PERMISSION_DENIED => (
            SendFailureKind::PermissionDenied,
            "The mailbox refused this message.",
            Some("Security rules do not allow writes to this collection."),
        ),
        codes::FAILED_PRECONDITION => (
            SendFailureKind::PreconditionFailed,
            "The mailbox is not set up to accept messages yet.",
            Some("The database may not have been created for this project."),
        ),
        codes::UNAVAILABLE => (
            SendFailureKind::Unavailable,
            "The mailbox is unreachable right now.",
            Some("The backend service is unavailable or the network is offline."),
        ),
        _ => (
            SendFailureKind::Unknown,
            "Sending ran into a problem, please refresh and try again.",
            None,
        ),
    };

    SendDiagnostic {
        kind,
        code: Some(error.code().to_string()),
        message: message.to_string(),
        reason: reason.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// The message being written.  Input longer than the soft limits is cut at
/// entry time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    name: String,
    content: String,
}

impl Draft {
    pub fn set_name(&mut self, name: &str) {
        self.name = truncate_chars(name, MAX_NAME_CHARS);
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = truncate_chars(content, MAX_CONTENT_CHARS);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.content.clear();
    }

    pub fn is_sendable(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Stored name: trimmed, or the placeholder when blank.
    pub fn display_name(&self) -> String {
        match self.name.trim() {
            "" => ANONYMOUS_NAME.to_string(),
            name => name.to_string(),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub id: MessageId,
    pub record: NewMessage,
    pub attempt: u64,
}

/// Clears the in-flight flag however the send ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Composer {
    manager: BackendClientManager,
    auth: AuthSession,
    send_timeout: Duration,
    draft: Mutex<Draft>,
    in_flight: AtomicBool,
    attempts: AtomicU64,
}

impl Composer {
    pub fn new(manager: BackendClientManager, auth: AuthSession, settings: &ClientSettings) -> Self {
        Self {
            manager,
            auth,
            send_timeout: settings.send_timeout,
            draft: Mutex::new(Draft::default()),
            in_flight: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
        }
    }

    fn draft_mut(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn draft(&self) -> Draft {
        self.draft_mut().clone()
    }

    pub fn set_name(&self, name: &str) {
        self.draft_mut().set_name(name);
    }

    pub fn set_content(&self, content: &str) {
        self.draft_mut().set_content(content);
    }

    /// `true` while a send is waiting on the backend; submit is disabled.
    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fill the draft and submit it.
    pub async fn send(&self, name: &str, content: &str) -> Result<SendReceipt> {
        {
            let mut draft = self.draft_mut();
            draft.set_name(name);
            draft.set_content(content);
        }
        self.submit().await
    }

    /// Submit the current draft.  On success the draft is cleared, unless it
    /// was changed while the send was in flight.
    pub async fn submit(&self) -> Result<SendReceipt> {
        let draft = self.draft();
        if !draft.is_sendable() {
            return Err(MailboxError::EmptyContent);
        }

        let ready = self.manager.ready()?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MailboxError::SendInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        self.auth.ensure_signed_in().await?;

        let record = NewMessage {
            name: draft.display_name(),
            content: draft.content().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            theme: rand::thread_rng().gen_range(0..THEME_PALETTE_SIZE),
        };
        let path = CollectionPath::mailbox(&ready.tenant);
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let (tx, rx) = oneshot::channel();
        let store = ready.handle.store().clone();
        let task_record = record.clone();
        tokio::spawn(async move {
            let result = store.create_record(&path, &task_record).await;
            if let Err(unheard) = tx.send(result) {
                debug!(attempt, outcome = ?unheard, "Ignoring late send result");
            }
        });

        match tokio::time::timeout(self.send_timeout, rx).await {
            Ok(Ok(Ok(id))) => {
                info!(attempt, id = %id, "Message sent");
                let mut current = self.draft_mut();
                if *current == draft {
                    current.clear();
                }
                drop(current);
                Ok(SendReceipt {
                    id,
                    record,
                    attempt,
                })
            }
            Ok(Ok(Err(e))) => {
                let diagnostic = classify_send_error(&e);
                warn!(attempt, code = %e.code(), kind = ?diagnostic.kind, error = %e, "Error sending message");
                Err(MailboxError::SendFailed(diagnostic))
            }
            Ok(Err(_)) => {
                warn!(attempt, "Send task ended without a result");
                Err(MailboxError::SendFailed(classify_send_error(&BackendError::new(
                    "internal",
                    "send task aborted",
                ))))
            }
            Err(_) => {
                warn!(attempt, timeout = ?self.send_timeout, "Send timed out, abandoning wait");
                Err(MailboxError::SendFailed(SendDiagnostic::timeout(
                    self.send_timeout,
                )))
            }
        }
    }
}
