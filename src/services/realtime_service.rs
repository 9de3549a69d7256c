//! In-process fan-out of messaging events to connected clients.
//!
//! Two kinds of rooms, both backed by `tokio::sync::broadcast`:
//!
//! - one room per conversation id, carrying fully-joined new messages;
//! - one room per user id, carrying coarse "your conversation set changed"
//!   signals that tell the client to re-fetch its list.
//!
//! Delivery is at-least-once and ordered within a room; subscribers that
//! fall behind the channel buffer observe a lag error and should re-fetch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::models::message::MessageWithSender;

/// Signal that a conversation row visible to the subscribed user changed
/// (new message, read-mark, archive, creation). Carries no diff: consumers
/// re-fetch their own filtered list, so the client cache can never diverge
/// from server state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationChange {
    pub conversation_id: Uuid,
}

/// Open feed of new messages for one conversation. Dropping the handle (or
/// calling [`MessageSubscription::unsubscribe`]) tears the feed down; the
/// empty room is pruned on the next publish.
pub struct MessageSubscription {
    conversation_id: Uuid,
    rx: broadcast::Receiver<MessageWithSender>,
}

impl MessageSubscription {
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub async fn recv(&mut self) -> Result<MessageWithSender, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<MessageWithSender, broadcast::error::TryRecvError> {
        self.rx.try_recv()
    }

    pub fn unsubscribe(self) {}
}

/// Open feed of conversation-list change signals for one user.
pub struct InboxSubscription {
    user_id: Uuid,
    rx: broadcast::Receiver<ConversationChange>,
}

impl InboxSubscription {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub async fn recv(&mut self) -> Result<ConversationChange, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<ConversationChange, broadcast::error::TryRecvError> {
        self.rx.try_recv()
    }

    pub fn unsubscribe(self) {}
}

/// Room registry for real-time delivery.
///
/// Reads (publishes) vastly outnumber subscribes, so the maps sit behind
/// `RwLock` and publishing takes the read side.
pub struct RealtimeHub {
    message_rooms: RwLock<HashMap<Uuid, broadcast::Sender<MessageWithSender>>>,
    inbox_rooms: RwLock<HashMap<Uuid, broadcast::Sender<ConversationChange>>>,
    capacity: usize,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            message_rooms: RwLock::new(HashMap::new()),
            inbox_rooms: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(128)
    }

    /// Every message published for `conversation_id` reaches every active
    /// subscriber, the sender's own echo included; consumers deduplicate by
    /// message id.
    pub async fn subscribe_to_messages(&self, conversation_id: Uuid) -> MessageSubscription {
        let mut rooms = self.message_rooms.write().await;
        let sender = rooms.entry(conversation_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.capacity);
            tx
        });
        MessageSubscription {
            conversation_id,
            rx: sender.subscribe(),
        }
    }

    pub async fn subscribe_to_conversations(&self, user_id: Uuid) -> InboxSubscription {
        let mut rooms = self.inbox_rooms.write().await;
        let sender = rooms.entry(user_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.capacity);
            tx
        });
        InboxSubscription {
            user_id,
            rx: sender.subscribe(),
        }
    }

    /// Push a committed message to the conversation's room. No subscribers
    /// is a no-op; a room whose last subscriber is gone gets pruned.
    pub async fn publish_message(&self, conversation_id: Uuid, message: MessageWithSender) {
        let rooms = self.message_rooms.read().await;
        let Some(sender) = rooms.get(&conversation_id) else {
            return;
        };
        if sender.send(message).is_err() {
            drop(rooms);
            let mut rooms = self.message_rooms.write().await;
            if rooms
                .get(&conversation_id)
                .is_some_and(|tx| tx.receiver_count() == 0)
            {
                rooms.remove(&conversation_id);
                tracing::trace!(%conversation_id, "pruned empty message room");
            }
        }
    }

    /// Signal the user's conversation-list room that something changed.
    pub async fn notify_conversation_change(&self, user_id: Uuid, conversation_id: Uuid) {
        let rooms = self.inbox_rooms.read().await;
        let Some(sender) = rooms.get(&user_id) else {
            return;
        };
        if sender.send(ConversationChange { conversation_id }).is_err() {
            drop(rooms);
            let mut rooms = self.inbox_rooms.write().await;
            if rooms
                .get(&user_id)
                .is_some_and(|tx| tx.receiver_count() == 0)
            {
                rooms.remove(&user_id);
                tracing::trace!(%user_id, "pruned empty inbox room");
            }
        }
    }

    pub async fn active_message_rooms(&self) -> usize {
        self.message_rooms.read().await.len()
    }

    pub async fn active_inbox_rooms(&self) -> usize {
        self.inbox_rooms.read().await.len()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageStatus;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn test_message(conversation_id: Uuid, content: &str) -> MessageWithSender {
        MessageWithSender {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            content: content.to_string(),
            is_from_buyer: true,
            status: MessageStatus::Sent,
            attachments: Vec::new(),
            created_at: Utc::now(),
            read_at: None,
            sender_name: "Alice".to_string(),
            sender_avatar_url: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let hub = RealtimeHub::with_default_capacity();
        let conversation_id = Uuid::new_v4();

        let mut sub = hub.subscribe_to_messages(conversation_id).await;
        assert_eq!(sub.conversation_id(), conversation_id);

        hub.publish_message(conversation_id, test_message(conversation_id, "hi"))
            .await;

        let received = sub.recv().await.unwrap();
        assert_eq!(received.content, "hi");
        assert_eq!(received.conversation_id, conversation_id);
    }

    #[tokio::test]
    async fn all_subscribers_of_a_conversation_receive_each_message() {
        let hub = RealtimeHub::with_default_capacity();
        let conversation_id = Uuid::new_v4();

        let mut buyer_client = hub.subscribe_to_messages(conversation_id).await;
        let mut vendor_client = hub.subscribe_to_messages(conversation_id).await;

        hub.publish_message(conversation_id, test_message(conversation_id, "hello"))
            .await;

        assert_eq!(buyer_client.recv().await.unwrap().content, "hello");
        assert_eq!(vendor_client.recv().await.unwrap().content, "hello");
    }

    #[tokio::test]
    async fn messages_arrive_in_publish_order() {
        let hub = RealtimeHub::with_default_capacity();
        let conversation_id = Uuid::new_v4();

        let mut sub = hub.subscribe_to_messages(conversation_id).await;
        for content in ["m1", "m2", "m3"] {
            hub.publish_message(conversation_id, test_message(conversation_id, content))
                .await;
        }

        assert_eq!(sub.recv().await.unwrap().content, "m1");
        assert_eq!(sub.recv().await.unwrap().content, "m2");
        assert_eq!(sub.recv().await.unwrap().content, "m3");
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let hub = RealtimeHub::with_default_capacity();
        let conversation_a = Uuid::new_v4();
        let conversation_b = Uuid::new_v4();

        let mut sub_a = hub.subscribe_to_messages(conversation_a).await;
        let mut sub_b = hub.subscribe_to_messages(conversation_b).await;

        hub.publish_message(conversation_a, test_message(conversation_a, "for a"))
            .await;

        assert_eq!(sub_a.recv().await.unwrap().content, "for a");
        assert!(sub_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let hub = RealtimeHub::with_default_capacity();
        let conversation_id = Uuid::new_v4();

        hub.publish_message(conversation_id, test_message(conversation_id, "void"))
            .await;

        assert_eq!(hub.active_message_rooms().await, 0);
    }

    #[tokio::test]
    async fn unsubscribed_room_is_pruned_on_next_publish() {
        let hub = RealtimeHub::with_default_capacity();
        let conversation_id = Uuid::new_v4();

        let sub = hub.subscribe_to_messages(conversation_id).await;
        assert_eq!(hub.active_message_rooms().await, 1);

        sub.unsubscribe();
        hub.publish_message(conversation_id, test_message(conversation_id, "late"))
            .await;

        assert_eq!(hub.active_message_rooms().await, 0);
    }

    #[tokio::test]
    async fn inbox_signal_carries_conversation_id() {
        let hub = RealtimeHub::with_default_capacity();
        let user_id = Uuid::new_v4();
        let conversation_id = Uuid::new_v4();

        let mut inbox = hub.subscribe_to_conversations(user_id).await;
        hub.notify_conversation_change(user_id, conversation_id)
            .await;

        let change = inbox.recv().await.unwrap();
        assert_eq!(change.conversation_id, conversation_id);
        assert_eq!(inbox.user_id(), user_id);
    }

    #[tokio::test]
    async fn inbox_signals_do_not_cross_users() {
        let hub = RealtimeHub::with_default_capacity();
        let buyer = Uuid::new_v4();
        let vendor_owner = Uuid::new_v4();
        let conversation_id = Uuid::new_v4();

        let mut buyer_inbox = hub.subscribe_to_conversations(buyer).await;
        let mut vendor_inbox = hub.subscribe_to_conversations(vendor_owner).await;

        hub.notify_conversation_change(buyer, conversation_id).await;

        assert_ok!(buyer_inbox.try_recv());
        assert_err!(vendor_inbox.try_recv());
    }
}
