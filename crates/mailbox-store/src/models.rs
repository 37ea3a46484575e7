//! Record shapes exchanged with the document store.
//!
//! Documents are schemaless on the backend, so the store hands back raw JSON
//! and the mapping into [`Message`] happens here, tolerating missing fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mailbox_shared::{Message, MessageId};

// ---------------------------------------------------------------------------
// StoredDocument
// ---------------------------------------------------------------------------

/// One document of a snapshot: the backend-assigned id plus its stored data.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: MessageId,
    pub data: Value,
}

impl StoredDocument {
    /// Merge the document id with its stored fields.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        let fields: StoredFields = serde_json::from_value(self.data.clone())?;
        Ok(Message {
            id: self.id.clone(),
            name: fields.name,
            content: fields.content,
            timestamp: fields.timestamp,
            theme: fields.theme,
        })
    }
}

// ---------------------------------------------------------------------------
// StoredFields
// ---------------------------------------------------------------------------

/// Fields of a message document as they may appear in storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoredFields {
    pub name: String,
    pub content: String,
    pub timestamp: Option<i64>,
    pub theme: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_message_merges_id() {
        let doc = StoredDocument {
            id: MessageId("abc".into()),
            data: json!({ "name": "Ana", "content": "hi", "timestamp": 42, "theme": 2 }),
        };
        let msg = doc.to_message().unwrap();
        assert_eq!(msg.id, MessageId("abc".into()));
        assert_eq!(msg.name, "Ana");
        assert_eq!(msg.timestamp, Some(42));
        assert_eq!(msg.theme, Some(2));
    }

    #[test]
    fn test_to_message_tolerates_missing_fields() {
        let doc = StoredDocument {
            id: MessageId("old".into()),
            data: json!({ "content": "legacy" }),
        };
        let msg = doc.to_message().unwrap();
        assert_eq!(msg.name, "");
        assert_eq!(msg.timestamp, None);
        assert_eq!(msg.theme, None);
    }

    #[test]
    fn test_to_message_rejects_wrong_types() {
        let doc = StoredDocument {
            id: MessageId("bad".into()),
            data: json!({ "content": "x", "timestamp": "yesterday" }),
        };
        assert!(doc.to_message().is_err());
    }
}
