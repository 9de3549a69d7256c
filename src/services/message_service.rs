use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::message::{Message, MessageWithSender};
use crate::models::party::Party;
use crate::services::realtime_service::RealtimeHub;

/// Appends messages, serves ordered history and maintains the per-party
/// unread counters. The counters and `last_message_at` are only ever touched
/// inside the same transaction as the message insert or read-mark, so
/// concurrent clients can never lose an update.
#[derive(Clone)]
pub struct MessageService {
    pool: PgPool,
    realtime: Arc<RealtimeHub>,
    max_message_length: usize,
}

impl MessageService {
    pub fn new(pool: PgPool, realtime: Arc<RealtimeHub>, max_message_length: usize) -> Self {
        Self {
            pool,
            realtime,
            max_message_length,
        }
    }

    /// Full message history for a conversation, ascending by creation time,
    /// joined with the sender's display identity. Missing conversation is a
    /// hard error.
    pub async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageWithSender>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM conversations WHERE id = $1)")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(Error::NotFound("Conversation not found".to_string()));
        }

        let messages = sqlx::query_as::<_, MessageWithSender>(
            r#"
            SELECT m.id, m.conversation_id, m.sender_id, m.content, m.is_from_buyer,
                   m.status, m.attachments, m.created_at, m.read_at,
                   u.name AS sender_name,
                   u.avatar_url AS sender_avatar_url
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Inserts a message and, in the same transaction, bumps the
    /// conversation's `last_message_at` and increments the recipient's unread
    /// counter. Resolves only after commit; real-time subscribers are
    /// notified afterwards, so a delivered push always refers to a durable
    /// row.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        from: Party,
        attachments: Vec<String>,
    ) -> Result<MessageWithSender> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::BadRequest(
                "Message content must not be empty".to_string(),
            ));
        }
        if content.chars().count() > self.max_message_length {
            return Err(Error::BadRequest(format!(
                "Message content exceeds {} characters",
                self.max_message_length
            )));
        }

        let sender: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT name, avatar_url FROM users WHERE id = $1")
                .bind(sender_id)
                .fetch_optional(&self.pool)
                .await?;
        let (sender_name, sender_avatar_url) =
            sender.ok_or_else(|| Error::NotFound("Sender not found".to_string()))?;

        let bump_sql = match from {
            // The *recipient's* counter is the one that grows.
            Party::Buyer => {
                r#"
                UPDATE conversations
                SET last_message_at = NOW(), updated_at = NOW(),
                    vendor_unread_count = vendor_unread_count + 1
                WHERE id = $1
                RETURNING buyer_id, vendor_id
                "#
            }
            Party::Vendor => {
                r#"
                UPDATE conversations
                SET last_message_at = NOW(), updated_at = NOW(),
                    buyer_unread_count = buyer_unread_count + 1
                WHERE id = $1
                RETURNING buyer_id, vendor_id
                "#
            }
        };

        let mut tx = self.pool.begin().await?;

        let parties: Option<(Uuid, Uuid)> = sqlx::query_as(bump_sql)
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (buyer_id, vendor_id) =
            parties.ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content, is_from_buyer, attachments)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, conversation_id, sender_id, content, is_from_buyer, status,
                      attachments, created_at, read_at
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(from.is_buyer())
        .bind(&attachments)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let message = MessageWithSender {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            is_from_buyer: message.is_from_buyer,
            status: message.status,
            attachments: message.attachments,
            created_at: message.created_at,
            read_at: message.read_at,
            sender_name,
            sender_avatar_url,
        };

        tracing::debug!(%conversation_id, message_id = %message.id, party = %from, "message stored");

        self.realtime
            .publish_message(conversation_id, message.clone())
            .await;
        self.realtime
            .notify_conversation_change(buyer_id, conversation_id)
            .await;
        if let Some(owner_id) = self.vendor_owner(vendor_id).await? {
            self.realtime
                .notify_conversation_change(owner_id, conversation_id)
                .await;
        }

        Ok(message)
    }

    /// Resets the calling party's unread counter and stamps that party's
    /// unread received messages as read, atomically. Idempotent: repeating
    /// the call with no new messages changes nothing.
    pub async fn mark_as_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        party: Party,
    ) -> Result<()> {
        let select_sql = match party {
            Party::Buyer => {
                "SELECT buyer_id, vendor_id, buyer_unread_count FROM conversations WHERE id = $1 FOR UPDATE"
            }
            Party::Vendor => {
                "SELECT buyer_id, vendor_id, vendor_unread_count FROM conversations WHERE id = $1 FOR UPDATE"
            }
        };

        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, Uuid, i32)> = sqlx::query_as(select_sql)
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (buyer_id, vendor_id, pending) =
            row.ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

        // With the counter already clean and nothing left to stamp, leave the
        // row untouched and fire no signals, so a repeat call is a true no-op.
        if pending == 0 {
            let unread_left: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE conversation_id = $1 AND is_from_buyer = $2 AND read_at IS NULL)",
            )
            .bind(conversation_id)
            .bind(party.counterpart().is_buyer())
            .fetch_one(&mut *tx)
            .await?;
            if !unread_left {
                tx.commit().await?;
                tracing::trace!(%conversation_id, %user_id, party = %party, "mark-read no-op");
                return Ok(());
            }
        }

        let reset_sql = match party {
            Party::Buyer => {
                "UPDATE conversations SET buyer_unread_count = 0, updated_at = NOW() WHERE id = $1"
            }
            Party::Vendor => {
                "UPDATE conversations SET vendor_unread_count = 0, updated_at = NOW() WHERE id = $1"
            }
        };
        sqlx::query(reset_sql)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        // Received messages are the ones the counterpart sent.
        let stamped = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'read', read_at = NOW()
            WHERE conversation_id = $1 AND is_from_buyer = $2 AND read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(party.counterpart().is_buyer())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            %conversation_id,
            %user_id,
            party = %party,
            stamped = stamped.rows_affected(),
            "conversation marked read"
        );

        self.realtime
            .notify_conversation_change(buyer_id, conversation_id)
            .await;
        if let Some(owner_id) = self.vendor_owner(vendor_id).await? {
            self.realtime
                .notify_conversation_change(owner_id, conversation_id)
                .await;
        }

        Ok(())
    }

    /// Sum of the user's per-party counters across all their conversations.
    /// O(conversation count): the counters are maintained at write time,
    /// never recomputed from message history.
    pub async fn unread_total(&self, user_id: Uuid, party: Party) -> Result<i64> {
        match party {
            Party::Buyer => {
                let total: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(SUM(buyer_unread_count), 0)::bigint FROM conversations WHERE buyer_id = $1",
                )
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(total)
            }
            Party::Vendor => {
                let vendor_id: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM vendors WHERE owner_id = $1")
                        .bind(user_id)
                        .fetch_optional(&self.pool)
                        .await?;
                let Some(vendor_id) = vendor_id else {
                    return Ok(0);
                };

                let total: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(SUM(vendor_unread_count), 0)::bigint FROM conversations WHERE vendor_id = $1",
                )
                .bind(vendor_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(total)
            }
        }
    }

    async fn vendor_owner(&self, vendor_id: Uuid) -> Result<Option<Uuid>> {
        let owner_id = sqlx::query_scalar("SELECT owner_id FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner_id)
    }
}
