use axum::{
    routing::{get, post},
    Router,
};
use shopthings_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let chat_api = Router::new()
        .route(
            "/api/chat/conversations",
            post(routes::chat::start_conversation).get(routes::chat::list_conversations),
        )
        .route(
            "/api/chat/conversations/:id/messages",
            get(routes::chat::get_messages).post(routes::chat::send_message),
        )
        .route(
            "/api/chat/conversations/:id/read",
            post(routes::chat::mark_as_read),
        )
        .route(
            "/api/chat/conversations/:id/archive",
            post(routes::chat::archive_conversation),
        )
        .route("/api/chat/unread", get(routes::chat::get_unread_count))
        .route(
            "/api/chat/conversations/:id/live",
            get(routes::live::conversation_live),
        )
        .route("/api/chat/inbox/live", get(routes::live::inbox_live));

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .merge(chat_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
