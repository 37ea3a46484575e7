//! Client core for the anonymous mailbox.
//!
//! Configuration resolution and the backend readiness state machine, plus
//! the components gated on them: sign-in, the read-view gate, the live
//! message feed and the composer.  [`MailboxApp`] ties them together.

pub mod auth;
pub mod composer;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod gate;
pub mod session;
pub mod share;
pub mod state;

#[cfg(test)]
mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use composer::{Composer, SendReceipt};
pub use config::{ClientSettings, ConfigResolver, RuntimeInputs};
pub use error::{MailboxError, Result};
pub use events::{notice_channel, Notice, NoticeBoard, NoticeLevel};
pub use session::{BackendClientManager, BackendRegistry, BackendState};
pub use share::share_instructions;
pub use state::{AppStatus, MailboxApp};

/// Install the global tracing subscriber, writing to stderr.  `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mailbox_cli=info,mailbox_client=debug,mailbox_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
