//! The mailbox application as one explicitly constructed object.
//!
//! [`MailboxApp`] wires the components together and is what a front end
//! holds.  It owns the view and gate state, recomputes the feed conditions
//! whenever one of them changes, and turns component errors into
//! [`Notice`]s.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use mailbox_shared::{Identity, Message, View};
use mailbox_store::BackendConnector;

use crate::auth::AuthSession;
use crate::composer::{Composer, SendReceipt};
use crate::config::{ClientSettings, ConfigResolver, RuntimeInputs};
use crate::error::{MailboxError, Result};
use crate::events::{emit_notice, Notice, NoticeSender};
use crate::feed::{FeedConditions, FeedStatus, MessageFeed};
use crate::gate::MailboxGate;
use crate::session::{BackendClientManager, BackendRegistry, BackendState, InitFailure};

/// Point-in-time summary for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppStatus {
    pub backend: &'static str,
    pub tenant: Option<String>,
    pub user: Option<String>,
    pub anonymous: Option<bool>,
    pub view: &'static str,
    pub unlocked: bool,
    pub feed_live: bool,
    pub sending: bool,
}

pub struct MailboxApp {
    manager: BackendClientManager,
    auth: AuthSession,
    gate: MailboxGate,
    view: View,
    feed: MessageFeed,
    composer: Arc<Composer>,
    settings: ClientSettings,
    notices: NoticeSender,
    identity_rx: Option<watch::Receiver<Option<Identity>>>,
}

impl MailboxApp {
    /// Resolve configuration, initialize the backend and run the startup
    /// sign-in.
    ///
    /// Never fails: a configuration or connection problem leaves the app in
    /// a blocked state and emits a blocking notice.
    pub async fn bootstrap(
        inputs: &RuntimeInputs,
        resolver: &ConfigResolver,
        registry: BackendRegistry,
        connector: Arc<dyn BackendConnector>,
        settings: ClientSettings,
        notices: NoticeSender,
    ) -> Self {
        let manager = BackendClientManager::new(registry, connector);
        let auth = AuthSession::new(manager.clone());
        let composer = Arc::new(Composer::new(manager.clone(), auth.clone(), &settings));

        let config = resolver.resolve();
        let state = manager
            .initialize(&config, inputs.tenant_id.as_deref())
            .await;

        let mut app = Self {
            feed: MessageFeed::new(manager.clone()),
            manager,
            auth,
            gate: MailboxGate::new(),
            view: View::default(),
            composer,
            settings,
            notices,
            identity_rx: None,
        };

        if let BackendState::Failed(failure) = state {
            emit_notice(&app.notices, blocking_notice_for(&failure));
            return app;
        }

        app.auth.start(inputs.auth_token.as_deref()).await;
        app.identity_rx = app.auth.watch();
        app.refresh_feed();
        app
    }

    // ----- View and gate -----

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) -> FeedStatus {
        if self.view != view {
            debug!(view = ?view, "View changed");
            self.view = view;
        }
        self.refresh_feed()
    }

    pub fn is_unlocked(&self) -> bool {
        self.gate.is_unlocked()
    }

    /// Try the passphrase.  A wrong guess leaves the gate locked and shows a
    /// banner.
    pub fn unlock(&mut self, candidate: &str) -> bool {
        if self.gate.unlock(candidate) {
            info!("Mailbox unlocked");
            self.refresh_feed();
            true
        } else {
            emit_notice(
                &self.notices,
                Notice::banner("Wrong passphrase", Some("The mailbox stays locked.".into())),
            );
            false
        }
    }

    // ----- Feed -----

    pub fn conditions(&self) -> FeedConditions {
        FeedConditions {
            backend_ready: self.manager.is_ready(),
            identity_present: self.auth.current().is_some(),
            view: self.view,
            unlocked: self.gate.is_unlocked(),
        }
    }

    /// Re-evaluate whether the feed should be live.
    pub fn refresh_feed(&mut self) -> FeedStatus {
        let conditions = self.conditions();
        self.feed.apply(conditions)
    }

    /// Wait for the signed-in identity to change, then re-evaluate the feed.
    ///
    /// Pending forever when there is no backend to watch.
    pub async fn next_identity_change(&mut self) -> Option<Identity> {
        let changed = match self.identity_rx.as_mut() {
            Some(rx) => rx.changed().await.is_ok(),
            None => false,
        };
        if !changed {
            self.identity_rx = None;
            std::future::pending::<()>().await;
        }

        let identity = self
            .identity_rx
            .as_mut()
            .and_then(|rx| rx.borrow_and_update().clone());
        debug!(present = identity.is_some(), "Identity changed");
        self.refresh_feed();
        identity
    }

    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.feed.messages()
    }

    pub fn latest_messages(&self) -> Vec<Message> {
        self.feed.latest()
    }

    /// Why the feed stopped, if it did.  Not retried until the feed
    /// conditions drop and come back.
    pub fn feed_error(&self) -> Option<MailboxError> {
        self.feed.last_error()
    }

    // ----- Compose -----

    pub fn composer(&self) -> &Arc<Composer> {
        &self.composer
    }

    /// Send a message and report the outcome as a notice.
    pub async fn send(&self, name: &str, content: &str) -> Result<SendReceipt> {
        let result = self.composer.send(name, content).await;
        match &result {
            Ok(_) => emit_notice(
                &self.notices,
                Notice::toast("Message sent", self.settings.success_notice),
            ),
            Err(e) => {
                if let Some(notice) = self.notice_for(e) {
                    emit_notice(&self.notices, notice);
                }
            }
        }
        result
    }

    fn notice_for(&self, error: &MailboxError) -> Option<Notice> {
        match error {
            e if e.is_blocking() => Some(self.blocking_notice().unwrap_or_else(|| {
                Notice::blocking("Mailbox is not ready", e.to_string())
            })),
            MailboxError::AuthFailed(diagnostic) => Some(Notice::banner(
                diagnostic.message.clone(),
                diagnostic.reason.clone().or_else(|| diagnostic.action.clone()),
            )),
            MailboxError::SendFailed(diagnostic) => Some(Notice::banner(
                diagnostic.message.clone(),
                diagnostic.reason.clone(),
            )),
            MailboxError::EmptyContent => Some(Notice::banner("Write something first", None)),
            // The submit control is disabled while sending.
            MailboxError::SendInFlight => None,
            other => Some(Notice::banner(other.to_string(), None)),
        }
    }

    // ----- Status -----

    /// The notice covering the whole surface, if startup failed.
    pub fn blocking_notice(&self) -> Option<Notice> {
        match self.manager.state() {
            BackendState::Failed(failure) => Some(blocking_notice_for(&failure)),
            _ => None,
        }
    }

    pub fn status(&self) -> AppStatus {
        let identity = self.auth.current();
        AppStatus {
            backend: self.manager.state().label(),
            tenant: self.manager.ready().ok().map(|r| r.tenant.to_string()),
            user: identity.as_ref().map(|i| i.user_id.short().to_string()),
            anonymous: identity.as_ref().map(|i| i.anonymous),
            view: match self.view {
                View::Write => "write",
                View::Read => "read",
            },
            unlocked: self.gate.is_unlocked(),
            feed_live: self.feed.status() == FeedStatus::Subscribed,
            sending: self.composer.is_sending(),
        }
    }
}

fn blocking_notice_for(failure: &InitFailure) -> Notice {
    let title = match failure {
        InitFailure::Config(_) => "Mailbox is not configured",
        InitFailure::Connect(_) => "Mailbox could not start",
    };
    Notice::blocking(title, failure.diagnostic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mailbox_shared::UserId;
    use mailbox_store::{codes, BackendError, MemoryBackend, MemoryConnector, WriteMode};

    use crate::config::{ConfigKey, DefaultsSource};
    use crate::events::{notice_channel, NoticeLevel, NoticeReceiver};
    use crate::testing::{settle, test_config};

    fn full_resolver() -> ConfigResolver {
        let config = test_config();
        let defaults = DefaultsSource::new()
            .with(ConfigKey::ApiKey, config.api_key)
            .with(ConfigKey::AuthDomain, config.auth_domain)
            .with(ConfigKey::ProjectId, config.project_id)
            .with(ConfigKey::StorageBucket, config.storage_bucket)
            .with(ConfigKey::MessagingSenderId, config.messaging_sender_id)
            .with(ConfigKey::AppId, config.app_id);
        ConfigResolver::new(vec![Box::new(defaults)])
    }

    async fn boot(
        backend: &MemoryBackend,
        inputs: RuntimeInputs,
        resolver: ConfigResolver,
    ) -> (MailboxApp, Arc<MemoryConnector>, NoticeReceiver) {
        let connector = Arc::new(MemoryConnector::new(backend.clone()));
        let (tx, rx) = notice_channel();
        let app = MailboxApp::bootstrap(
            &inputs,
            &resolver,
            BackendRegistry::new(),
            connector.clone(),
            ClientSettings::default(),
            tx,
        )
        .await;
        (app, connector, rx)
    }

    #[tokio::test]
    async fn test_bootstrap_signs_in_and_stays_quiet() {
        let backend = MemoryBackend::new();
        let (app, connector, mut notices) =
            boot(&backend, RuntimeInputs::default(), full_resolver()).await;

        let status = app.status();
        assert_eq!(status.backend, "ready");
        assert_eq!(status.tenant.as_deref(), Some("demo-project"));
        assert_eq!(status.anonymous, Some(true));
        assert_eq!(connector.connect_count(), 1);
        assert!(app.blocking_notice().is_none());
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_config_blocks_without_connecting() {
        let backend = MemoryBackend::new();
        let resolver = ConfigResolver::new(vec![Box::new(DefaultsSource::new())]);
        let (app, connector, mut notices) = boot(&backend, RuntimeInputs::default(), resolver).await;

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Blocking);
        assert!(notice.detail.unwrap().contains("MAILBOX_API_KEY"));
        assert_eq!(connector.connect_count(), 0);
        assert_eq!(backend.sign_in_calls(), 0);

        let err = app.send("Ana", "hello").await.unwrap_err();
        assert!(matches!(err, MailboxError::ConfigInvalid(_)));
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Blocking);
    }

    #[tokio::test]
    async fn test_injected_token_and_tenant_are_used() {
        let backend = MemoryBackend::new();
        backend.accept_token("tok", UserId("operator".into()));
        let inputs = RuntimeInputs {
            auth_token: Some("tok".into()),
            tenant_id: Some("friends".into()),
            ..Default::default()
        };
        let (app, _, _) = boot(&backend, inputs, full_resolver()).await;

        let status = app.status();
        assert_eq!(status.tenant.as_deref(), Some("friends"));
        assert_eq!(status.anonymous, Some(false));
    }

    #[tokio::test]
    async fn test_feed_follows_view_and_gate() {
        let backend = MemoryBackend::new();
        let (mut app, _, mut notices) =
            boot(&backend, RuntimeInputs::default(), full_resolver()).await;

        assert_eq!(app.set_view(View::Read), FeedStatus::Unsubscribed);

        assert!(!app.unlock("wrong"));
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Banner);
        assert!(!app.status().feed_live);

        assert!(app.unlock("520"));
        assert!(app.status().feed_live);

        assert_eq!(app.set_view(View::Write), FeedStatus::Unsubscribed);
        // The gate stays open for the session.
        assert_eq!(app.set_view(View::Read), FeedStatus::Subscribed);
    }

    #[tokio::test]
    async fn test_identity_change_activates_feed() {
        let backend = MemoryBackend::new();
        backend.fail_next_sign_in(BackendError::new(codes::NETWORK_REQUEST_FAILED, "offline"));
        let (mut app, _, _) = boot(&backend, RuntimeInputs::default(), full_resolver()).await;

        app.set_view(View::Read);
        app.unlock("520");
        assert!(!app.status().feed_live);

        // Sending signs in lazily; the identity watch picks it up.
        app.send("Ana", "first").await.unwrap();
        let identity = app.next_identity_change().await;
        assert!(identity.is_some());
        assert!(app.status().feed_live);

        settle().await;
        let messages = app.latest_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first");
    }

    #[tokio::test]
    async fn test_sign_out_tears_down_feed() {
        let backend = MemoryBackend::new();
        let (mut app, _, _) = boot(&backend, RuntimeInputs::default(), full_resolver()).await;
        app.set_view(View::Read);
        app.unlock("520");
        settle().await;
        assert!(app.status().feed_live);

        backend.sign_out();
        assert!(app.next_identity_change().await.is_none());
        assert!(!app.status().feed_live);

        settle().await;
        let path = mailbox_store::CollectionPath::mailbox(&mailbox_shared::TenantId::new(
            "demo-project",
        ));
        assert_eq!(backend.subscriber_count(&path), 0);
    }

    #[tokio::test]
    async fn test_subscription_error_is_silent() {
        let backend = MemoryBackend::new();
        let (mut app, _, mut notices) =
            boot(&backend, RuntimeInputs::default(), full_resolver()).await;
        app.set_view(View::Read);
        app.unlock("520");
        settle().await;

        let path = mailbox_store::CollectionPath::mailbox(&mailbox_shared::TenantId::new(
            "demo-project",
        ));
        backend.fail_subscriptions(&path, BackendError::new(codes::PERMISSION_DENIED, "rules"));
        settle().await;

        assert!(matches!(
            app.feed_error(),
            Some(MailboxError::SubscriptionFailed(_))
        ));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_success_emits_timed_toast() {
        let backend = MemoryBackend::new();
        let (app, _, mut notices) = boot(&backend, RuntimeInputs::default(), full_resolver()).await;

        app.send("", "hi").await.unwrap();
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Toast);
        assert_eq!(notice.dismiss_after, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_send_failure_emits_banner_and_keeps_draft() {
        let backend = MemoryBackend::new();
        let (app, _, mut notices) = boot(&backend, RuntimeInputs::default(), full_resolver()).await;
        backend.set_write_mode(WriteMode::Fail(BackendError::new(codes::UNAVAILABLE, "down")));

        assert!(app.send("Ana", "hi").await.is_err());
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Banner);
        assert!(notice.title.contains("unreachable"));
        assert_eq!(app.composer().draft().content(), "hi");
    }
}
