//! Backend configuration resolution and client settings.
//!
//! Backend credentials can come from three places, in priority order:
//! 1. A runtime override injected by the host (JSON object or JSON string)
//! 2. Environment variables (`MAILBOX_API_KEY`, ...)
//! 3. Defaults embedded at compile time (`MAILBOX_DEFAULT_API_KEY`, ...)
//!
//! Each key is resolved independently: the first source with a non-empty
//! value wins.  If any required key is still missing the resolver returns
//! [`ConfigError`] and no backend call may be made.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use mailbox_shared::constants::{SEND_TIMEOUT_MS, SUCCESS_NOTICE_MS};
use mailbox_shared::BackendConfig;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// One configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ApiKey,
    AuthDomain,
    ProjectId,
    StorageBucket,
    MessagingSenderId,
    AppId,
    MeasurementId,
}

impl ConfigKey {
    /// Keys that must all be present for a configuration to be valid.
    pub const REQUIRED: [ConfigKey; 6] = [
        ConfigKey::ApiKey,
        ConfigKey::AuthDomain,
        ConfigKey::ProjectId,
        ConfigKey::StorageBucket,
        ConfigKey::MessagingSenderId,
        ConfigKey::AppId,
    ];

    /// Field name in a runtime override object.
    pub fn field(self) -> &'static str {
        match self {
            Self::ApiKey => "apiKey",
            Self::AuthDomain => "authDomain",
            Self::ProjectId => "projectId",
            Self::StorageBucket => "storageBucket",
            Self::MessagingSenderId => "messagingSenderId",
            Self::AppId => "appId",
            Self::MeasurementId => "measurementId",
        }
    }

    /// Environment variable consulted by [`EnvSource`].
    pub fn env_var(self) -> &'static str {
        match self {
            Self::ApiKey => "MAILBOX_API_KEY",
            Self::AuthDomain => "MAILBOX_AUTH_DOMAIN",
            Self::ProjectId => "MAILBOX_PROJECT_ID",
            Self::StorageBucket => "MAILBOX_STORAGE_BUCKET",
            Self::MessagingSenderId => "MAILBOX_MESSAGING_SENDER_ID",
            Self::AppId => "MAILBOX_BACKEND_APP_ID",
            Self::MeasurementId => "MAILBOX_MEASUREMENT_ID",
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", join_keys(.0))]
    MissingKeys(Vec<ConfigKey>),
}

impl ConfigError {
    pub fn missing(&self) -> &[ConfigKey] {
        match self {
            Self::MissingKeys(keys) => keys,
        }
    }

    /// Environment variables that would fix this error.
    pub fn env_hint(&self) -> String {
        self.missing()
            .iter()
            .map(|k| k.env_var())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn join_keys(keys: &[ConfigKey]) -> String {
    keys.iter()
        .map(|k| k.field())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A provider of configuration values, consulted key by key.
pub trait ConfigSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn value(&self, key: ConfigKey) -> Option<String>;
}

/// Empty and whitespace-only values count as absent.  Accepted values are
/// kept exactly as supplied.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration injected by the host at runtime.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverride {
    values: Option<Map<String, Value>>,
}

impl RuntimeOverride {
    pub fn absent() -> Self {
        Self::default()
    }

    /// Anything other than a JSON object is treated as absent.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self { values: Some(map) },
            Value::Null => Self::absent(),
            other => {
                warn!(kind = json_kind(&other), "Runtime config is not an object, ignoring");
                Self::absent()
            }
        }
    }

    /// Parse a serialized override.  A parse failure falls through to the
    /// next source instead of failing resolution.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                warn!(error = %e, "Unable to parse runtime config string, ignoring");
                Self::absent()
            }
        }
    }

    pub fn from_input(input: &RuntimeConfig) -> Self {
        match input {
            RuntimeConfig::Json(raw) => Self::from_json(raw),
            RuntimeConfig::Value(value) => Self::from_value(value.clone()),
        }
    }

    pub fn is_present(&self) -> bool {
        self.values.is_some()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ConfigSource for RuntimeOverride {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn value(&self, key: ConfigKey) -> Option<String> {
        let raw = match self.values.as_ref()?.get(key.field())? {
            Value::String(s) => s.clone(),
            // Sender ids are sometimes written as bare numbers.
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        non_empty(Some(raw))
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment-supplied values.
pub struct EnvSource {
    lookup: Lookup,
}

impl EnvSource {
    /// Read from the process environment.
    pub fn from_process() -> Self {
        Self::from_fn(|name| std::env::var(name).ok())
    }

    /// Read through an arbitrary lookup function.
    pub fn from_fn(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn value(&self, key: ConfigKey) -> Option<String> {
        non_empty((self.lookup)(key.env_var()))
    }
}

/// Last-resort defaults.
#[derive(Debug, Clone, Default)]
pub struct DefaultsSource {
    values: HashMap<ConfigKey, String>,
}

impl DefaultsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults embedded at build time.
    /// Build with: MAILBOX_DEFAULT_API_KEY=xxx ... cargo build --release
    ///
    /// A build without any `MAILBOX_DEFAULT_*` variables embeds nothing, so
    /// resolution fails with [`ConfigError::MissingKeys`] unless the runtime
    /// override or the environment supplies every required key.
    pub fn compiled() -> Self {
        let embedded = [
            (ConfigKey::ApiKey, option_env!("MAILBOX_DEFAULT_API_KEY")),
            (ConfigKey::AuthDomain, option_env!("MAILBOX_DEFAULT_AUTH_DOMAIN")),
            (ConfigKey::ProjectId, option_env!("MAILBOX_DEFAULT_PROJECT_ID")),
            (ConfigKey::StorageBucket, option_env!("MAILBOX_DEFAULT_STORAGE_BUCKET")),
            (
                ConfigKey::MessagingSenderId,
                option_env!("MAILBOX_DEFAULT_MESSAGING_SENDER_ID"),
            ),
            (ConfigKey::AppId, option_env!("MAILBOX_DEFAULT_APP_ID")),
            (ConfigKey::MeasurementId, option_env!("MAILBOX_DEFAULT_MEASUREMENT_ID")),
        ];

        let mut defaults = Self::new();
        for (key, value) in embedded {
            if let Some(v) = value {
                defaults = defaults.with(key, v);
            }
        }
        defaults
    }

    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }
}

impl ConfigSource for DefaultsSource {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn value(&self, key: ConfigKey) -> Option<String> {
        non_empty(self.values.get(&key).cloned())
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Merges an ordered list of sources into a [`BackendConfig`].
pub struct ConfigResolver {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigResolver {
    /// Sources are consulted in the given order; earlier ones win.
    pub fn new(sources: Vec<Box<dyn ConfigSource>>) -> Self {
        Self { sources }
    }

    /// Runtime override, then process environment, then compiled defaults.
    pub fn standard(inputs: &RuntimeInputs) -> Self {
        let runtime = inputs
            .config
            .as_ref()
            .map(RuntimeOverride::from_input)
            .unwrap_or_default();

        Self::new(vec![
            Box::new(runtime),
            Box::new(EnvSource::from_process()),
            Box::new(DefaultsSource::compiled()),
        ])
    }

    /// Append a source below all existing ones.
    pub fn with_fallback(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// First non-empty value for `key`, with the name of the source it came from.
    pub fn lookup(&self, key: ConfigKey) -> Option<(String, &'static str)> {
        self.sources
            .iter()
            .find_map(|source| source.value(key).map(|v| (v, source.name())))
    }

    pub fn resolve(&self) -> Result<BackendConfig, ConfigError> {
        let mut found: HashMap<ConfigKey, String> = HashMap::new();
        let mut missing = Vec::new();

        for key in ConfigKey::REQUIRED {
            match self.lookup(key) {
                Some((value, source)) => {
                    debug!(key = key.field(), source, "Config key resolved");
                    found.insert(key, value);
                }
                None => missing.push(key),
            }
        }

        if !missing.is_empty() {
            warn!(missing = %join_keys(&missing), "Backend configuration is incomplete");
            return Err(ConfigError::MissingKeys(missing));
        }

        let mut take = |key: ConfigKey| found.remove(&key).unwrap_or_default();
        Ok(BackendConfig {
            api_key: take(ConfigKey::ApiKey),
            auth_domain: take(ConfigKey::AuthDomain),
            project_id: take(ConfigKey::ProjectId),
            storage_bucket: take(ConfigKey::StorageBucket),
            messaging_sender_id: take(ConfigKey::MessagingSenderId),
            app_id: take(ConfigKey::AppId),
            measurement_id: self.lookup(ConfigKey::MeasurementId).map(|(v, _)| v),
        })
    }
}

// ---------------------------------------------------------------------------
// Runtime inputs
// ---------------------------------------------------------------------------

/// A runtime configuration override as the host supplies it.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeConfig {
    /// Serialized JSON, parsed during resolution.
    Json(String),
    Value(Value),
}

/// Values the host may inject before startup.
#[derive(Debug, Clone, Default)]
pub struct RuntimeInputs {
    pub config: Option<RuntimeConfig>,
    /// Custom auth token exchanged for an identity at startup.
    pub auth_token: Option<String>,
    /// Explicit tenant id; overrides the project id.
    pub tenant_id: Option<String>,
}

impl RuntimeInputs {
    /// Read `MAILBOX_RUNTIME_CONFIG`, `MAILBOX_AUTH_TOKEN` and
    /// `MAILBOX_TENANT_ID`.  Empty values are treated as unset.
    pub fn from_env() -> Self {
        let var = |name: &str| non_empty(std::env::var(name).ok());
        Self {
            config: var("MAILBOX_RUNTIME_CONFIG").map(RuntimeConfig::Json),
            auth_token: var("MAILBOX_AUTH_TOKEN"),
            tenant_id: var("MAILBOX_TENANT_ID"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client settings
// ---------------------------------------------------------------------------

/// Client-side timing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// How long a send waits for the backend before giving up.
    pub send_timeout: Duration,
    /// How long the "sent" notice stays visible.
    pub success_notice: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(SEND_TIMEOUT_MS),
            success_notice: Duration::from_millis(SUCCESS_NOTICE_MS),
        }
    }
}

impl ClientSettings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("MAILBOX_SEND_TIMEOUT_MS") {
            match parse_millis(&val) {
                Some(d) => settings.send_timeout = d,
                None => warn!(value = %val, "Invalid MAILBOX_SEND_TIMEOUT_MS, using default"),
            }
        }

        if let Ok(val) = std::env::var("MAILBOX_SUCCESS_NOTICE_MS") {
            match parse_millis(&val) {
                Some(d) => settings.success_notice = d,
                None => warn!(value = %val, "Invalid MAILBOX_SUCCESS_NOTICE_MS, using default"),
            }
        }

        settings
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&'static str, &'static str)]) -> EnvSource {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvSource::from_fn(move |name| map.get(name).cloned())
    }

    fn full_defaults() -> DefaultsSource {
        ConfigKey::REQUIRED
            .iter()
            .fold(DefaultsSource::new(), |d, key| {
                d.with(*key, format!("default-{}", key.field()))
            })
    }

    #[test]
    fn test_defaults_alone_resolve() {
        let resolver = ConfigResolver::new(vec![Box::new(full_defaults())]);
        let config = resolver.resolve().unwrap();
        assert_eq!(config.project_id, "default-projectId");
        assert_eq!(config.measurement_id, None);
    }

    #[test]
    fn test_priority_is_per_key() {
        let runtime = RuntimeOverride::from_value(json!({ "apiKey": "runtime-key" }));
        let environment = env(&[
            ("MAILBOX_API_KEY", "env-key"),
            ("MAILBOX_PROJECT_ID", "env-project"),
        ]);
        let resolver = ConfigResolver::new(vec![
            Box::new(runtime),
            Box::new(environment),
            Box::new(full_defaults()),
        ]);

        let config = resolver.resolve().unwrap();
        assert_eq!(config.api_key, "runtime-key");
        assert_eq!(config.project_id, "env-project");
        assert_eq!(config.app_id, "default-appId");
    }

    #[test]
    fn test_sources_can_cover_keys_collectively() {
        let runtime = RuntimeOverride::from_value(json!({
            "apiKey": "k", "authDomain": "d", "projectId": "p"
        }));
        let environment = env(&[
            ("MAILBOX_STORAGE_BUCKET", "b"),
            ("MAILBOX_MESSAGING_SENDER_ID", "s"),
        ]);
        let defaults = DefaultsSource::new().with(ConfigKey::AppId, "a");
        let resolver =
            ConfigResolver::new(vec![Box::new(runtime), Box::new(environment), Box::new(defaults)]);

        let config = resolver.resolve().unwrap();
        assert_eq!(
            (config.api_key.as_str(), config.storage_bucket.as_str(), config.app_id.as_str()),
            ("k", "b", "a")
        );
    }

    #[test]
    fn test_unparseable_runtime_string_falls_through() {
        let runtime = RuntimeOverride::from_json("{not json");
        assert!(!runtime.is_present());

        let resolver = ConfigResolver::new(vec![Box::new(runtime), Box::new(full_defaults())]);
        assert_eq!(resolver.resolve().unwrap().api_key, "default-apiKey");
    }

    #[test]
    fn test_runtime_json_string_is_parsed() {
        let runtime = RuntimeOverride::from_input(&RuntimeConfig::Json(
            r#"{"projectId":"from-json","messagingSenderId":12345}"#.into(),
        ));
        assert_eq!(runtime.value(ConfigKey::ProjectId).as_deref(), Some("from-json"));
        assert_eq!(runtime.value(ConfigKey::MessagingSenderId).as_deref(), Some("12345"));
    }

    #[test]
    fn test_non_object_runtime_value_is_absent() {
        assert!(!RuntimeOverride::from_value(json!(["apiKey"])).is_present());
        assert!(!RuntimeOverride::from_json("\"apiKey\"").is_present());
    }

    #[test]
    fn test_empty_values_fall_through() {
        let runtime = RuntimeOverride::from_value(json!({ "apiKey": "", "appId": "   " }));
        let resolver = ConfigResolver::new(vec![Box::new(runtime), Box::new(full_defaults())]);
        let config = resolver.resolve().unwrap();
        assert_eq!(config.api_key, "default-apiKey");
        assert_eq!(config.app_id, "default-appId");
    }

    #[test]
    fn test_missing_key_in_all_sources_is_error() {
        let defaults = ConfigKey::REQUIRED
            .iter()
            .filter(|k| **k != ConfigKey::StorageBucket)
            .fold(DefaultsSource::new(), |d, k| d.with(*k, "x"));
        let environment = env(&[("MAILBOX_STORAGE_BUCKET", "")]);
        let resolver = ConfigResolver::new(vec![Box::new(environment), Box::new(defaults)]);

        let err = resolver.resolve().unwrap_err();
        assert_eq!(err.missing(), &[ConfigKey::StorageBucket]);
        assert_eq!(err.env_hint(), "MAILBOX_STORAGE_BUCKET");
        assert!(err.to_string().contains("storageBucket"));
    }

    #[test]
    fn test_no_sources_reports_every_required_key() {
        let err = ConfigResolver::new(vec![]).resolve().unwrap_err();
        assert_eq!(err.missing().len(), 6);
    }

    #[test]
    fn test_measurement_id_is_optional_and_prioritised() {
        let environment = env(&[("MAILBOX_MEASUREMENT_ID", "G-ENV")]);
        let defaults = full_defaults().with(ConfigKey::MeasurementId, "G-DEFAULT");
        let resolver = ConfigResolver::new(vec![Box::new(environment), Box::new(defaults)]);
        assert_eq!(resolver.resolve().unwrap().measurement_id.as_deref(), Some("G-ENV"));
    }

    #[test]
    fn test_lookup_reports_source() {
        let resolver = ConfigResolver::new(vec![
            Box::new(env(&[("MAILBOX_API_KEY", "k")])),
            Box::new(full_defaults()),
        ]);
        assert_eq!(resolver.lookup(ConfigKey::ApiKey), Some(("k".into(), "environment")));
        assert_eq!(
            resolver.lookup(ConfigKey::AppId).map(|(_, s)| s),
            Some("defaults")
        );
    }

    #[test]
    fn test_accepted_values_are_not_trimmed() {
        let resolver = ConfigResolver::new(vec![
            Box::new(env(&[("MAILBOX_API_KEY", " key with padding ")])),
            Box::new(full_defaults()),
        ]);
        assert_eq!(resolver.resolve().unwrap().api_key, " key with padding ");
    }

    #[test]
    fn test_compiled_defaults_without_build_vars_do_not_resolve() {
        if option_env!("MAILBOX_DEFAULT_API_KEY").is_some() {
            return;
        }
        let resolver = ConfigResolver::new(vec![Box::new(DefaultsSource::compiled())]);
        assert!(resolver
            .resolve()
            .unwrap_err()
            .missing()
            .contains(&ConfigKey::ApiKey));
    }

    #[test]
    fn test_fallback_is_consulted_last() {
        let resolver = ConfigResolver::new(vec![Box::new(env(&[("MAILBOX_API_KEY", "k")]))])
            .with_fallback(Box::new(full_defaults()));
        let config = resolver.resolve().unwrap();
        assert_eq!(config.api_key, "k");
        assert!(!config.app_id.is_empty());
    }

    #[test]
    fn test_default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.send_timeout, Duration::from_secs(12));
        assert_eq!(settings.success_notice, Duration::from_secs(3));
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis(" 500 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_millis("0"), None);
        assert_eq!(parse_millis("soon"), None);
    }
}
