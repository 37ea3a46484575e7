//! Live message feed for the read view.
//!
//! The feed is either `Subscribed` or `Unsubscribed`.  Which one is decided
//! solely by [`FeedConditions::active`]: backend ready, identity present, read
//! view showing and gate unlocked.  [`MessageFeed::apply`] is called whenever
//! any of those inputs changes and subscribes or tears down accordingly.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mailbox_shared::{Message, View};
use mailbox_store::{CollectionPath, StoredDocument, Subscription};

use crate::error::MailboxError;
use crate::session::BackendClientManager;

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

/// Inputs that decide whether the feed should be live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedConditions {
    pub backend_ready: bool,
    pub identity_present: bool,
    pub view: View,
    pub unlocked: bool,
}

impl FeedConditions {
    pub fn active(&self) -> bool {
        self.backend_ready && self.identity_present && self.view == View::Read && self.unlocked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Unsubscribed,
    Subscribed,
}

// ---------------------------------------------------------------------------
// Snapshot mapping
// ---------------------------------------------------------------------------

/// Newest first.  Missing timestamps count as 0 and so sort last.
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.timestamp.unwrap_or(0).cmp(&a.timestamp.unwrap_or(0)));
}

/// Map one snapshot into sorted messages, skipping malformed documents.
pub fn map_snapshot(documents: &[StoredDocument]) -> Vec<Message> {
    let mut messages: Vec<Message> = documents
        .iter()
        .filter_map(|doc| match doc.to_message() {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping malformed message document");
                None
            }
        })
        .collect();
    sort_newest_first(&mut messages);
    messages
}

// ---------------------------------------------------------------------------
// MessageFeed
// ---------------------------------------------------------------------------

pub struct MessageFeed {
    manager: BackendClientManager,
    messages_tx: watch::Sender<Vec<Message>>,
    error_tx: watch::Sender<Option<MailboxError>>,
    status: FeedStatus,
    task: Option<JoinHandle<()>>,
}

impl MessageFeed {
    pub fn new(manager: BackendClientManager) -> Self {
        let (messages_tx, _) = watch::channel(Vec::new());
        let (error_tx, _) = watch::channel(None);
        Self {
            manager,
            messages_tx,
            error_tx,
            status: FeedStatus::Unsubscribed,
            task: None,
        }
    }

    /// Drive the two-state machine from the current conditions.
    ///
    /// Only transitions act: staying `Subscribed` does not resubscribe, even
    /// if the previous subscription ended with an error.
    pub fn apply(&mut self, conditions: FeedConditions) -> FeedStatus {
        match (self.status, conditions.active()) {
            (FeedStatus::Unsubscribed, true) => {
                self.status = FeedStatus::Subscribed;
                self.subscribe();
            }
            (FeedStatus::Subscribed, false) => {
                self.status = FeedStatus::Unsubscribed;
                self.cancel();
            }
            _ => {}
        }
        self.status
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    /// Sorted messages from the latest snapshot.  Kept after unsubscribing.
    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages_tx.subscribe()
    }

    pub fn latest(&self) -> Vec<Message> {
        self.messages_tx.borrow().clone()
    }

    /// Last subscription error, cleared when a new subscription starts.
    pub fn last_error(&self) -> Option<MailboxError> {
        self.error_tx.borrow().clone()
    }

    fn subscribe(&mut self) {
        let ready = match self.manager.ready() {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "Feed activated without a ready backend");
                self.error_tx.send_replace(Some(e));
                return;
            }
        };

        let path = CollectionPath::mailbox(&ready.tenant);
        let subscription = match ready.handle.store().subscribe(&path) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(path = %path, error = %e, "Error subscribing to messages");
                self.error_tx.send_replace(Some(MailboxError::SubscriptionFailed(e.to_string())));
                return;
            }
        };

        info!(path = %path, "Message feed subscribed");
        self.error_tx.send_replace(None);
        self.task = Some(tokio::spawn(pump(
            subscription,
            self.messages_tx.clone(),
            self.error_tx.clone(),
        )));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            // Aborting drops the subscription, which unsubscribes.
            task.abort();
            info!("Message feed unsubscribed");
        }
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Forward snapshots until the subscription closes or fails.
async fn pump(
    mut subscription: Subscription,
    messages_tx: watch::Sender<Vec<Message>>,
    error_tx: watch::Sender<Option<MailboxError>>,
) {
    while let Some(event) = subscription.next().await {
        match event {
            Ok(documents) => {
                let messages = map_snapshot(&documents);
                debug!(count = messages.len(), "Feed snapshot");
                messages_tx.send_replace(messages);
            }
            Err(e) => {
                warn!(error = %e, "Error fetching messages");
                error_tx.send_replace(Some(MailboxError::SubscriptionFailed(e.to_string())));
                return;
            }
        }
    }
    debug!("Feed subscription closed by backend");
}
