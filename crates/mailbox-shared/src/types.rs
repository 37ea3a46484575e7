use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::constants::{ANONYMOUS_NAME, DEFAULT_TENANT_ID, THEME_PALETTE_SIZE};

/// Deployment namespace under which every record is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self(DEFAULT_TENANT_ID.to_string())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-assigned record identifier. Opaque to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque user handle issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed-in user as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    /// `true` for anonymous sign-ins, `false` for custom-token sign-ins.
    pub anonymous: bool,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Fields written by the composer when a message is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub name: String,
    pub content: String,
    /// Client clock, epoch milliseconds. Not authoritative.
    pub timestamp: i64,
    pub theme: u8,
}

/// A message as read back from the live collection.
///
/// Stored documents may predate the current schema, so `timestamp` and
/// `theme` are optional on the read side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub name: String,
    pub content: String,
    pub timestamp: Option<i64>,
    pub theme: Option<u8>,
}

impl Message {
    /// Name to render, falling back to the placeholder for blank names.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            ANONYMOUS_NAME
        } else {
            &self.name
        }
    }

    pub fn theme(&self) -> Theme {
        Theme::from_index(self.theme.unwrap_or(0))
    }

    /// Local time in `YYYY-MM-DD HH:MM:SS`, or an empty string when the
    /// message carries no usable timestamp.
    pub fn display_time(&self) -> String {
        self.timestamp
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Card palette a message is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    Pink,
    Purple,
    Orange,
}

impl Theme {
    /// Indices wrap around the palette so out-of-range values still render.
    pub fn from_index(index: u8) -> Self {
        match index % THEME_PALETTE_SIZE {
            0 => Self::Pink,
            1 => Self::Purple,
            _ => Self::Orange,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pink => "pink",
            Self::Purple => "purple",
            Self::Orange => "orange",
        }
    }
}

/// Which half of the widget is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    #[default]
    Write,
    Read,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str, timestamp: Option<i64>, theme: Option<u8>) -> Message {
        Message {
            id: MessageId("m1".into()),
            name: name.into(),
            content: "hello".into(),
            timestamp,
            theme,
        }
    }

    #[test]
    fn test_theme_wraps_around_palette() {
        assert_eq!(Theme::from_index(0), Theme::Pink);
        assert_eq!(Theme::from_index(2), Theme::Orange);
        assert_eq!(Theme::from_index(4), Theme::Purple);
    }

    #[test]
    fn test_blank_name_displays_placeholder() {
        assert_eq!(message("   ", None, None).display_name(), ANONYMOUS_NAME);
        assert_eq!(message("Ana", None, None).display_name(), "Ana");
    }

    #[test]
    fn test_missing_theme_uses_first_palette_entry() {
        assert_eq!(message("a", None, None).theme(), Theme::Pink);
        assert_eq!(message("a", None, Some(1)).theme(), Theme::Purple);
    }

    #[test]
    fn test_display_time_empty_without_timestamp() {
        assert!(message("a", None, None).display_time().is_empty());
        assert_eq!(message("a", Some(0), None).display_time().len(), 19);
    }

    #[test]
    fn test_user_id_short() {
        assert_eq!(UserId("abcdefghijkl".into()).short(), "abcdefgh");
        assert_eq!(UserId("abc".into()).short(), "abc");
    }

    #[test]
    fn test_default_tenant() {
        assert_eq!(TenantId::default().as_str(), DEFAULT_TENANT_ID);
    }
}
