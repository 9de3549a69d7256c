//! WebSocket feeds backing the live chat UI: one per open conversation
//! thread, one per inbox. The handlers bridge a hub subscription onto the
//! socket and tear it down when the client goes away, so an unmounted UI
//! never leaks a room.

use crate::{
    dto::chat_dto::InboxLiveQuery,
    error::{Error, Result},
    AppState,
};
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// `GET /api/chat/conversations/:id/live` — pushes every new message of the
/// conversation to the client as JSON. The sender's own echo is included;
/// clients deduplicate by message id.
pub async fn conversation_live(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM conversations WHERE id = $1)")
            .bind(conversation_id)
            .fetch_one(&state.pool)
            .await?;
    if !exists {
        return Err(Error::NotFound("Conversation not found".to_string()));
    }

    Ok(ws.on_upgrade(move |socket| stream_messages(socket, conversation_id, state)))
}

/// `GET /api/chat/inbox/live?user_id=` — pushes conversation-list change
/// signals; the client re-fetches its list on each one.
pub async fn inbox_live(
    ws: WebSocketUpgrade,
    Query(query): Query<InboxLiveQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    Ok(ws.on_upgrade(move |socket| stream_inbox(socket, query.user_id, state)))
}

async fn stream_messages(socket: WebSocket, conversation_id: Uuid, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut sub = state.realtime.subscribe_to_messages(conversation_id).await;

    loop {
        tokio::select! {
            event = sub.recv() => match event {
                Ok(message) => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(%conversation_id, error = ?e, "message serialization failed");
                            break;
                        }
                    };
                    if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // At-least-once, not exactly-once: the client re-fetches
                    // history after a gap.
                    tracing::warn!(%conversation_id, skipped, "live feed lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(%conversation_id, error = ?e, "websocket receive error");
                    break;
                }
                _ => {}
            },
        }
    }

    sub.unsubscribe();
    tracing::debug!(%conversation_id, "conversation live feed closed");
}

async fn stream_inbox(socket: WebSocket, user_id: Uuid, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut sub = state.realtime.subscribe_to_conversations(user_id).await;

    loop {
        tokio::select! {
            event = sub.recv() => match event {
                Ok(change) => {
                    let json = match serde_json::to_string(&change) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(%user_id, error = ?e, "change serialization failed");
                            break;
                        }
                    };
                    if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    // Signals are coarse; missing some is fine, the next one
                    // still triggers a full re-fetch.
                }
                Err(RecvError::Closed) => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(%user_id, error = ?e, "websocket receive error");
                    break;
                }
                _ => {}
            },
        }
    }

    sub.unsubscribe();
    tracing::debug!(%user_id, "inbox live feed closed");
}
