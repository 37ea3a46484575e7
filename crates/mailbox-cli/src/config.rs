//! Front-end settings loaded from environment variables.
//!
//! Backend configuration is resolved by the client crate; this only covers
//! what the terminal front end itself needs.

use mailbox_client::config::{ConfigKey, DefaultsSource};

/// Terminal front-end configuration.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Public link handed out by the `share` command.
    /// Env: `MAILBOX_SHARE_URL`
    /// Default: empty.
    pub share_url: String,

    /// Fill any backend keys nobody else supplied with placeholder values,
    /// so the in-process backend can run without setup.
    /// Env: `MAILBOX_LOCAL_DEMO` (true/false)
    /// Default: `false`
    pub local_demo: bool,

    /// Name used for sends until `name` is given.
    /// Env: `MAILBOX_NAME`
    /// Default: empty (stored as the anonymous placeholder).
    pub default_name: String,
}

impl CliConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = var("MAILBOX_SHARE_URL") {
            config.share_url = url.trim().to_string();
        }

        if let Some(val) = var("MAILBOX_LOCAL_DEMO") {
            match parse_flag(&val) {
                Some(flag) => config.local_demo = flag,
                None => tracing::warn!(value = %val, "Invalid MAILBOX_LOCAL_DEMO, using default"),
            }
        }

        if let Some(name) = var("MAILBOX_NAME") {
            config.default_name = name;
        }

        config
    }

    /// Lowest-priority source used when `local_demo` is set.
    pub fn demo_defaults(&self) -> DefaultsSource {
        let project = "local-mailbox";
        DefaultsSource::new()
            .with(ConfigKey::ApiKey, "local-demo-key")
            .with(ConfigKey::AuthDomain, format!("{project}.localhost"))
            .with(ConfigKey::ProjectId, project)
            .with(ConfigKey::StorageBucket, format!("{project}.local"))
            .with(ConfigKey::MessagingSenderId, "0")
            .with(ConfigKey::AppId, "1:0:cli:local")
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
