//! Mapping between domain types and store documents.
//!
//! Field names follow the persisted layout (`email`, `username`,
//! `participants`, `senderId`, `message`, `timestamp`) so existing data stays
//! readable.

use serde_json::json;

use duologue_types::conversation::{Conversation, ConversationId};
use duologue_types::document::{Document, Fields, fields};
use duologue_types::error::StoreError;
use duologue_types::message::{ChatMessage, MessageId};
use duologue_types::user::{User, UserId};

fn missing(kind: &str, id: &str, field: &str) -> StoreError {
    StoreError::Query(format!("{kind} document '{id}' has no valid '{field}' field"))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub fn user_fields(email: &str, username: &str) -> Fields {
    let mut map = Fields::new();
    map.insert(fields::EMAIL.into(), json!(email));
    map.insert(fields::USERNAME.into(), json!(username));
    map
}

pub fn user_from_document(doc: &Document) -> Result<User, StoreError> {
    let email = doc
        .get_str(fields::EMAIL)
        .ok_or_else(|| missing("user", &doc.id, fields::EMAIL))?;
    let username = doc
        .get_str(fields::USERNAME)
        .ok_or_else(|| missing("user", &doc.id, fields::USERNAME))?;

    Ok(User {
        id: UserId(doc.id.clone()),
        email: email.to_string(),
        username: username.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

pub fn conversation_fields(initiator: &UserId, partner: &UserId) -> Fields {
    let mut map = Fields::new();
    map.insert(
        fields::PARTICIPANTS.into(),
        json!([initiator.as_str(), partner.as_str()]),
    );
    map
}

/// Decode a conversation. Anything but exactly two distinct participants is
/// rejected.
pub fn conversation_from_document(doc: &Document) -> Result<Conversation, StoreError> {
    let participants = doc
        .get_str_array(fields::PARTICIPANTS)
        .ok_or_else(|| missing("conversation", &doc.id, fields::PARTICIPANTS))?;

    match participants.as_slice() {
        [a, b] if a != b => Ok(Conversation {
            id: ConversationId(doc.id.clone()),
            participants: [UserId::from(*a), UserId::from(*b)],
        }),
        other => Err(StoreError::Query(format!(
            "conversation document '{}' must have two distinct participants, found {}",
            doc.id,
            other.len()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub fn message_fields(sender_id: &UserId, body: &str, timestamp: i64) -> Fields {
    let mut map = Fields::new();
    map.insert(fields::SENDER_ID.into(), json!(sender_id.as_str()));
    map.insert(fields::MESSAGE.into(), json!(body));
    map.insert(fields::TIMESTAMP.into(), json!(timestamp));
    map
}

pub fn message_from_document(
    conversation_id: &ConversationId,
    doc: &Document,
) -> Result<ChatMessage, StoreError> {
    let sender_id = doc
        .get_str(fields::SENDER_ID)
        .ok_or_else(|| missing("message", &doc.id, fields::SENDER_ID))?;
    let body = doc
        .get_str(fields::MESSAGE)
        .ok_or_else(|| missing("message", &doc.id, fields::MESSAGE))?;
    let timestamp = doc
        .get_i64(fields::TIMESTAMP)
        .ok_or_else(|| missing("message", &doc.id, fields::TIMESTAMP))?;

    Ok(ChatMessage {
        id: MessageId(doc.id.clone()),
        conversation_id: conversation_id.clone(),
        sender_id: UserId::from(sender_id),
        body: body.to_string(),
        timestamp,
        seq: doc.seq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn object(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_user_fields_decode_back() {
        let doc = Document::new("u1", 1, user_fields("alice@x.com", "alice"));
        let user = user_from_document(&doc).unwrap();
        assert_eq!(user.id, UserId::from("u1"));
        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_user_missing_email_is_rejected() {
        let doc = Document::new("u1", 1, object(json!({"username": "alice"})));
        let err = user_from_document(&doc).unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_conversation_keeps_participant_order() {
        let doc = Document::new(
            "c1",
            1,
            conversation_fields(&UserId::from("u2"), &UserId::from("u1")),
        );
        let conversation = conversation_from_document(&doc).unwrap();
        assert_eq!(
            conversation.participants,
            [UserId::from("u2"), UserId::from("u1")]
        );
    }

    #[test]
    fn test_conversation_rejects_wrong_participant_count() {
        let three = Document::new("c", 1, object(json!({"participants": ["a", "b", "c"]})));
        assert!(conversation_from_document(&three).is_err());

        let same = Document::new("c", 2, object(json!({"participants": ["a", "a"]})));
        assert!(conversation_from_document(&same).is_err());
    }

    #[test]
    fn test_message_uses_persisted_field_names() {
        let fields = message_fields(&UserId::from("u1"), "hi", 1234);
        assert_eq!(fields["senderId"], json!("u1"));
        assert_eq!(fields["message"], json!("hi"));
        assert_eq!(fields["timestamp"], json!(1234));

        let doc = Document::new("m1", 7, fields);
        let msg = message_from_document(&ConversationId::from("c1"), &doc).unwrap();
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.timestamp, 1234);
        assert_eq!(msg.seq, 7);
        assert_eq!(msg.conversation_id, ConversationId::from("c1"));
    }

    #[test]
    fn test_message_without_timestamp_is_rejected() {
        let doc = Document::new("m1", 1, object(json!({"senderId": "u1", "message": "hi"})));
        assert!(message_from_document(&ConversationId::from("c1"), &doc).is_err());
    }
}
