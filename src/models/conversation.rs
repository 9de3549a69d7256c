use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A buyer/vendor conversation row. Never hard-deleted; archival is a
/// per-party visibility flag. The two unread counters are maintained inside
/// the same transaction as the send/mark-read that changes them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub product_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub buyer_unread_count: i32,
    pub vendor_unread_count: i32,
    pub is_archived_by_buyer: bool,
    pub is_archived_by_vendor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation joined with the counterpart's display identity and the
/// scoped product's display fields, as rendered in a conversation list.
/// For a buyer the counterpart is the store; for a vendor it is the buyer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationWithDetails {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub product_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub buyer_unread_count: i32,
    pub vendor_unread_count: i32,
    pub is_archived_by_buyer: bool,
    pub is_archived_by_vendor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub counterpart_name: String,
    pub counterpart_avatar_url: Option<String>,
    pub product_title: Option<String>,
    pub product_image_url: Option<String>,
}
