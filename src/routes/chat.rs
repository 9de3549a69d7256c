use crate::{
    dto::chat_dto::{
        ArchivePayload, ChatListQuery, MarkReadPayload, SendMessagePayload,
        StartConversationPayload,
    },
    error::Result,
    models::party::Party,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[axum::debug_handler]
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(payload): Json<StartConversationPayload>,
) -> Result<impl IntoResponse> {
    let conversation_id = state
        .conversation_service
        .get_or_create(payload.buyer_id, payload.vendor_id, payload.product_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "conversation_id": conversation_id })),
    ))
}

#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ChatListQuery>,
) -> Result<impl IntoResponse> {
    let party = Party::from_vendor_flag(query.as_vendor);
    let conversations = state
        .conversation_service
        .list_conversations(query.user_id, party)
        .await?;
    Ok(Json(conversations))
}

#[axum::debug_handler]
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.get_messages(conversation_id).await?;
    Ok(Json(messages))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let party = Party::from_vendor_flag(payload.as_vendor);
    let message = state
        .message_service
        .send_message(
            conversation_id,
            payload.sender_id,
            &payload.content,
            party,
            payload.attachments,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[axum::debug_handler]
pub async fn mark_as_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<MarkReadPayload>,
) -> Result<impl IntoResponse> {
    let party = Party::from_vendor_flag(payload.as_vendor);
    state
        .message_service
        .mark_as_read(conversation_id, payload.user_id, party)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn archive_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<ArchivePayload>,
) -> Result<impl IntoResponse> {
    let party = Party::from_vendor_flag(payload.as_vendor);
    state
        .conversation_service
        .archive(conversation_id, party)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn get_unread_count(
    State(state): State<AppState>,
    Query(query): Query<ChatListQuery>,
) -> Result<impl IntoResponse> {
    let party = Party::from_vendor_flag(query.as_vendor);
    let count = state
        .message_service
        .unread_total(query.user_id, party)
        .await?;
    Ok(Json(json!({ "unread_count": count })))
}
