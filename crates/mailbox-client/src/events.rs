//! User-facing notices.
//!
//! The client never renders anything itself.  It emits [`Notice`] values on
//! a channel and the front end decides how to show them.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::error;

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Replaces the whole interface.  Nothing else works until restart.
    Blocking,
    /// Inline error next to the action that failed.
    Banner,
    /// Short-lived confirmation.
    Toast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: Option<String>,
    /// Auto-dismiss delay; `None` stays until replaced.
    #[serde(skip)]
    pub dismiss_after: Option<Duration>,
}

impl Notice {
    pub fn blocking(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Blocking,
            title: title.into(),
            detail: Some(detail.into()),
            dismiss_after: None,
        }
    }

    pub fn banner(title: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            level: NoticeLevel::Banner,
            title: title.into(),
            detail,
            dismiss_after: None,
        }
    }

    pub fn toast(title: impl Into<String>, dismiss_after: Duration) -> Self {
        Self {
            level: NoticeLevel::Toast,
            title: title.into(),
            detail: None,
            dismiss_after: Some(dismiss_after),
        }
    }
}

pub fn emit_notice(tx: &NoticeSender, notice: Notice) {
    let level = notice.level;
    if let Err(e) = tx.send(notice) {
        error!(level = ?level, error = %e, "Failed to emit notice");
    }
}

/// Notices currently on screen, with their expiry.
///
/// A new notice of the same level replaces the previous one.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    shown: Vec<(Notice, Option<Instant>)>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice, now: Instant) {
        self.shown.retain(|(n, _)| n.level != notice.level);
        let expires = notice.dismiss_after.map(|d| now + d);
        self.shown.push((notice, expires));
    }

    /// Drop expired notices and return what is still visible.
    pub fn visible(&mut self, now: Instant) -> Vec<&Notice> {
        self.shown
            .retain(|(_, expires)| expires.map_or(true, |at| now < at));
        self.shown.iter().map(|(n, _)| n).collect()
    }

    pub fn dismiss(&mut self, level: NoticeLevel) {
        self.shown.retain(|(n, _)| n.level != level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_expires() {
        let now = Instant::now();
        let mut board = NoticeBoard::new();
        board.push(Notice::toast("Sent", Duration::from_secs(3)), now);
        board.push(Notice::banner("Oops", None), now);

        assert_eq!(board.visible(now + Duration::from_secs(2)).len(), 2);
        let left = board.visible(now + Duration::from_secs(3));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].level, NoticeLevel::Banner);
    }

    #[test]
    fn test_same_level_replaces() {
        let now = Instant::now();
        let mut board = NoticeBoard::new();
        board.push(Notice::banner("first", None), now);
        board.push(Notice::banner("second", None), now);

        let visible = board.visible(now);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "second");

        board.dismiss(NoticeLevel::Banner);
        assert!(board.visible(now).is_empty());
    }

    #[test]
    fn test_notice_serializes_without_timer() {
        let json = serde_json::to_value(Notice::toast("Sent", Duration::from_secs(3))).unwrap();
        assert_eq!(json["level"], "toast");
        assert!(json.get("dismiss_after").is_none());
    }

    #[tokio::test]
    async fn test_emit_notice_delivers() {
        let (tx, mut rx) = notice_channel();
        emit_notice(&tx, Notice::blocking("Down", "config missing"));
        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Blocking);

        drop(rx);
        // Closed channel is logged, not a panic.
        emit_notice(&tx, Notice::toast("late", Duration::from_secs(1)));
    }
}
