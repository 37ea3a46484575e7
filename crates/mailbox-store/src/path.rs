//! Collection addressing.

use mailbox_shared::constants::{DATA_SEGMENT, MESSAGES_COLLECTION, PUBLIC_SEGMENT, ROOT_COLLECTION};
use mailbox_shared::TenantId;

/// A five-segment collection path scoped to one deployment:
/// `artifacts/{tenant}/public/data/mailbox-messages`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    segments: [String; 5],
}

impl CollectionPath {
    /// The message collection for `tenant`.
    pub fn mailbox(tenant: &TenantId) -> Self {
        Self {
            segments: [
                ROOT_COLLECTION.to_string(),
                tenant.as_str().to_string(),
                PUBLIC_SEGMENT.to_string(),
                DATA_SEGMENT.to_string(),
                MESSAGES_COLLECTION.to_string(),
            ],
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn tenant(&self) -> &str {
        &self.segments[1]
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
