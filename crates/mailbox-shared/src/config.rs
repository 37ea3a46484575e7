use serde::{Deserialize, Serialize};

/// Resolved backend credentials.
///
/// Only ever constructed by the client's config resolver once every required
/// field is known to be non-empty; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<String>,
}

impl BackendConfig {
    /// Key under which a connection for this config is registered.
    /// Two configs naming the same project and app share one connection.
    pub fn connection_key(&self) -> String {
        format!("{}/{}", self.project_id, self.app_id)
    }
}
