use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::conversation::ConversationWithDetails;
use crate::models::party::Party;
use crate::services::realtime_service::RealtimeHub;

/// Resolves and lists the single conversation between a buyer and a vendor,
/// optionally scoped to a product.
#[derive(Clone)]
pub struct ConversationService {
    pool: PgPool,
    realtime: Arc<RealtimeHub>,
}

impl ConversationService {
    pub fn new(pool: PgPool, realtime: Arc<RealtimeHub>) -> Self {
        Self { pool, realtime }
    }

    /// Atomic find-or-create on the (buyer, vendor[, product]) key. Safe
    /// under both parties racing to send the first message: the upsert
    /// targets the unique participants index, so exactly one row results.
    pub async fn get_or_create(
        &self,
        buyer_id: Uuid,
        vendor_id: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM vendors WHERE id = $1")
                .bind(vendor_id)
                .fetch_optional(&self.pool)
                .await?;

        let owner_id =
            owner_id.ok_or_else(|| Error::NotFound("Vendor not found".to_string()))?;
        if owner_id == buyer_id {
            return Err(Error::BadRequest(
                "Cannot start a conversation with your own store".to_string(),
            ));
        }

        let conversation_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO conversations (buyer_id, vendor_id, product_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (buyer_id, vendor_id, COALESCE(product_id, '00000000-0000-0000-0000-000000000000'::uuid))
            DO UPDATE SET updated_at = NOW() -- no-op update so the existing row is returned
            RETURNING id
            "#,
        )
        .bind(buyer_id)
        .bind(vendor_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(%conversation_id, %buyer_id, %vendor_id, "resolved conversation");

        self.realtime
            .notify_conversation_change(buyer_id, conversation_id)
            .await;
        self.realtime
            .notify_conversation_change(owner_id, conversation_id)
            .await;

        Ok(conversation_id)
    }

    /// All of a user's conversations, joined with the counterpart's display
    /// identity and the scoped product, most recently active first. Rows the
    /// calling party archived are hidden. A vendor-mode user with no vendor
    /// record gets an empty list, not an error.
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
        party: Party,
    ) -> Result<Vec<ConversationWithDetails>> {
        match party {
            Party::Buyer => {
                let conversations = sqlx::query_as::<_, ConversationWithDetails>(
                    r#"
                    SELECT c.id, c.buyer_id, c.vendor_id, c.product_id, c.last_message_at,
                           c.buyer_unread_count, c.vendor_unread_count,
                           c.is_archived_by_buyer, c.is_archived_by_vendor,
                           c.created_at, c.updated_at,
                           v.store_name AS counterpart_name,
                           v.logo_url AS counterpart_avatar_url,
                           p.title AS product_title,
                           p.image_url AS product_image_url
                    FROM conversations c
                    JOIN vendors v ON v.id = c.vendor_id
                    LEFT JOIN products p ON p.id = c.product_id
                    WHERE c.buyer_id = $1 AND c.is_archived_by_buyer = FALSE
                    ORDER BY c.last_message_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
                Ok(conversations)
            }
            Party::Vendor => {
                let vendor_id: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM vendors WHERE owner_id = $1")
                        .bind(user_id)
                        .fetch_optional(&self.pool)
                        .await?;
                let Some(vendor_id) = vendor_id else {
                    return Ok(Vec::new());
                };

                let conversations = sqlx::query_as::<_, ConversationWithDetails>(
                    r#"
                    SELECT c.id, c.buyer_id, c.vendor_id, c.product_id, c.last_message_at,
                           c.buyer_unread_count, c.vendor_unread_count,
                           c.is_archived_by_buyer, c.is_archived_by_vendor,
                           c.created_at, c.updated_at,
                           u.name AS counterpart_name,
                           u.avatar_url AS counterpart_avatar_url,
                           p.title AS product_title,
                           p.image_url AS product_image_url
                    FROM conversations c
                    JOIN users u ON u.id = c.buyer_id
                    LEFT JOIN products p ON p.id = c.product_id
                    WHERE c.vendor_id = $1 AND c.is_archived_by_vendor = FALSE
                    ORDER BY c.last_message_at DESC
                    "#,
                )
                .bind(vendor_id)
                .fetch_all(&self.pool)
                .await?;
                Ok(conversations)
            }
        }
    }

    /// Sets the calling party's archive flag. The counterpart's view is
    /// unaffected; nothing is deleted.
    pub async fn archive(&self, conversation_id: Uuid, party: Party) -> Result<()> {
        let sql = match party {
            Party::Buyer => {
                "UPDATE conversations SET is_archived_by_buyer = TRUE, updated_at = NOW() WHERE id = $1 RETURNING buyer_id, vendor_id"
            }
            Party::Vendor => {
                "UPDATE conversations SET is_archived_by_vendor = TRUE, updated_at = NOW() WHERE id = $1 RETURNING buyer_id, vendor_id"
            }
        };

        let row: Option<(Uuid, Uuid)> = sqlx::query_as(sql)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        let (buyer_id, vendor_id) =
            row.ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

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

    async fn vendor_owner(&self, vendor_id: Uuid) -> Result<Option<Uuid>> {
        let owner_id = sqlx::query_scalar("SELECT owner_id FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner_id)
    }
}
