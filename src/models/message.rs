use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a message. `sent` is assigned at insert, `read` when the
/// receiving party marks the conversation read. `delivered` exists in the
/// schema but nothing produces it; it is reserved for a transport-level
/// acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// A single message row. Immutable after insert except for the
/// status/`read_at` transition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_from_buyer: bool,
    pub status: MessageStatus,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Message joined with the sender's display identity. This is the shape
/// returned to the sender's client and pushed to real-time subscribers, so
/// both sides render from the same payload.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithSender {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_from_buyer: bool,
    pub status: MessageStatus,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub sender_name: String,
    pub sender_avatar_url: Option<String>,
}
