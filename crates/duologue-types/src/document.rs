//! Generic document model consumed from the document store.
//!
//! A document is a JSON object addressed by `(collection, id)`. Stores assign a
//! monotonically increasing `seq` on first insertion; it is the deterministic
//! tie-break whenever two documents share an ordering value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Collection paths of the persisted layout.
pub mod collections {
    use crate::conversation::ConversationId;

    pub const USERS: &str = "users";
    pub const CONVERSATIONS: &str = "conversations";

    /// Sub-collection holding the messages of one conversation.
    pub fn messages(conversation_id: &ConversationId) -> String {
        format!("{CONVERSATIONS}/{conversation_id}/messages")
    }
}

/// Field names of the persisted layout.
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const USERNAME: &str = "username";
    pub const PARTICIPANTS: &str = "participants";
    pub const SENDER_ID: &str = "senderId";
    pub const MESSAGE: &str = "message";
    pub const TIMESTAMP: &str = "timestamp";
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Store insertion sequence.
    pub seq: u64,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, seq: u64, fields: Fields) -> Self {
        Self {
            id: id.into(),
            seq,
            fields,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    /// String elements of an array field. Non-string elements are skipped.
    pub fn get_str_array(&self, field: &str) -> Option<Vec<&str>> {
        self.fields
            .get(field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
    }

    /// Whether `field` equals `value`.
    pub fn field_equals(&self, field: &str, value: &Value) -> bool {
        self.fields.get(field) == Some(value)
    }

    /// Whether `field` is an array containing `value`.
    pub fn array_contains(&self, field: &str, value: &Value) -> bool {
        self.fields
            .get(field)
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(value))
    }
}

/// Kind of a reported document change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single change reported by a live query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// A batch of changes delivered together by a live query.
///
/// The first batch of every subscription is the ordered snapshot of the
/// documents that already existed, all reported as `Added`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub changes: Vec<DocumentChange>,
}

impl ChangeBatch {
    /// A batch reporting every document as newly added.
    pub fn added(documents: Vec<Document>) -> Self {
        Self {
            changes: documents
                .into_iter()
                .map(|document| DocumentChange {
                    kind: ChangeKind::Added,
                    document,
                })
                .collect(),
        }
    }

    pub fn single(kind: ChangeKind, document: Document) -> Self {
        Self {
            changes: vec![DocumentChange { kind, document }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drop changes whose document has no integer value for `field`.
    pub fn retain_ordered_by(mut self, field: &str) -> Self {
        self.changes
            .retain(|change| change.document.get_i64(field).is_some());
        self
    }
}

/// Sort documents by an integer ordering field ascending, then by `seq`.
///
/// Documents without an integer value for `field` are dropped, matching how
/// ordered live queries exclude documents that lack the ordering field.
pub fn order_by_field(documents: Vec<Document>, field: &str) -> Vec<Document> {
    let mut keyed: Vec<(i64, Document)> = documents
        .into_iter()
        .filter_map(|doc| doc.get_i64(field).map(|key| (key, doc)))
        .collect();
    keyed.sort_by_key(|(key, doc)| (*key, doc.seq));
    keyed.into_iter().map(|(_, doc)| doc).collect()
}
