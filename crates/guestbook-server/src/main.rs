use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use guestbook_api::chat;
use guestbook_chat::{ChatEngine, LiveHub, RelayPublisher, Transport};
use guestbook_gateway::connection;

/// State for the live upgrade route. `live` is populated only on
/// direct-hub deployments; without it, upgrade attempts are answered
/// with a transport-unavailable notice and closed.
#[derive(Clone)]
struct WsState {
    engine: Arc<ChatEngine>,
    live: Option<Arc<LiveHub>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestbook=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("GUESTBOOK_JWT_SECRET").unwrap_or_else(|_| {
        warn!("GUESTBOOK_JWT_SECRET not set, falling back to the built-in default");
        "fallback-secret".into()
    });
    let db_path = std::env::var("GUESTBOOK_DB_PATH").unwrap_or_else(|_| "guestbook.db".into());
    let host = std::env::var("GUESTBOOK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("GUESTBOOK_PORT")
        .unwrap_or_else(|_| "3001".into())
        .parse()?;
    let scope = std::env::var("GUESTBOOK_SCOPE").unwrap_or_else(|_| "guestbook".into());
    let strategy = std::env::var("GUESTBOOK_TRANSPORT").unwrap_or_else(|_| "live".into());

    // Init database
    let db = Arc::new(guestbook_store::Database::open(&PathBuf::from(&db_path))?);

    // Transport strategy: exactly one per deployment
    let (transport, live): (Arc<dyn Transport>, Option<Arc<LiveHub>>) = match strategy.as_str() {
        "live" => {
            let live = Arc::new(LiveHub::new());
            (live.clone(), Some(live))
        }
        "relay" => {
            let relay_url = std::env::var("GUESTBOOK_RELAY_URL").ok();
            let relay_key = std::env::var("GUESTBOOK_RELAY_KEY").ok();
            let relay = RelayPublisher::new(relay_url.as_deref(), relay_key.as_deref());
            (Arc::new(relay), None)
        }
        other => anyhow::bail!(
            "unknown GUESTBOOK_TRANSPORT '{}' (expected 'live' or 'relay')",
            other
        ),
    };
    info!("Transport strategy: {}", transport.name());

    let engine = Arc::new(ChatEngine::new(db, transport, &jwt_secret, scope));

    // Routes
    let api_routes = Router::new()
        .route("/chat", get(chat::list_messages).post(chat::send_message))
        .route("/chat/count", get(chat::message_count))
        .route("/chat/reply", post(chat::admin_reply))
        .route("/chat/{id}", delete(chat::admin_delete))
        .with_state(engine.clone());

    let ws_route = Router::new()
        .route("/chat", get(ws_upgrade))
        .with_state(WsState { engine, live });

    let app = Router::new()
        .nest("/api", api_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Guestbook server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<WsState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        match state.live {
            Some(live) => connection::handle_connection(socket, state.engine, live).await,
            None => connection::handle_unavailable(socket).await,
        }
    })
}
