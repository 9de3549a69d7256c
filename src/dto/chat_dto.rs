use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct StartConversationPayload {
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessagePayload {
    pub sender_id: Uuid,
    #[validate(
        length(min = 1),
        custom(function = "crate::utils::validation::not_blank")
    )]
    pub content: String,
    #[serde(default)]
    pub as_vendor: bool,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadPayload {
    pub user_id: Uuid,
    #[serde(default)]
    pub as_vendor: bool,
}

#[derive(Debug, Deserialize)]
pub struct ArchivePayload {
    #[serde(default)]
    pub as_vendor: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatListQuery {
    pub user_id: Uuid,
    #[serde(default)]
    pub as_vendor: bool,
}

#[derive(Debug, Deserialize)]
pub struct InboxLiveQuery {
    pub user_id: Uuid,
}
