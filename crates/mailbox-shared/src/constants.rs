/// Application name
pub const APP_NAME: &str = "Mailbox";

/// Tenant id used when neither a runtime override nor a project id is known
pub const DEFAULT_TENANT_ID: &str = "default-app-id";

/// Collection path segments: `{ROOT}/{tenant}/public/data/{MESSAGES}`
pub const ROOT_COLLECTION: &str = "artifacts";
pub const PUBLIC_SEGMENT: &str = "public";
pub const DATA_SEGMENT: &str = "data";
pub const MESSAGES_COLLECTION: &str = "mailbox-messages";

/// Shared passphrase for the read view.
///
/// This is a cosmetic gate compared in plain text on the client. It offers no
/// confidentiality: anyone holding the binary can read it.
pub const UNLOCK_PASSPHRASE: &str = "520";

/// Display name stored when the sender leaves the name blank
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Soft input limits, in characters
pub const MAX_NAME_CHARS: usize = 30;
pub const MAX_CONTENT_CHARS: usize = 600;

/// Number of card themes a message can be rendered with
pub const THEME_PALETTE_SIZE: u8 = 3;

/// Overall wait for a message write before the caller gives up (ms)
pub const SEND_TIMEOUT_MS: u64 = 12_000;

/// How long the "sent" notice stays visible (ms)
pub const SUCCESS_NOTICE_MS: u64 = 3_000;
