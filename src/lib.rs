pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::services::{
    conversation_service::ConversationService, message_service::MessageService,
    realtime_service::RealtimeHub,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    pub realtime: Arc<RealtimeHub>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let realtime = Arc::new(RealtimeHub::new(config.realtime_buffer));
        let conversation_service = ConversationService::new(pool.clone(), realtime.clone());
        let message_service =
            MessageService::new(pool.clone(), realtime.clone(), config.max_message_length);

        Self {
            pool,
            conversation_service,
            message_service,
            realtime,
        }
    }
}
