use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use parley_conversation::{Orchestrator, RoundRunner};
use parley_core::{MessageStore, PUBLIC_ROOM};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::http;
use crate::registry::SessionRegistry;
use crate::router::MessageRouter;
use crate::socket;

/// Listener settings of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            outbound_queue: 256,
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub orchestrator: Arc<Orchestrator>,
    pub rounds: Arc<RoundRunner>,
    pub store: Arc<dyn MessageStore>,
    pub public_room: String,
    pub outbound_queue: usize,
}

impl AppState {
    /// Wire a fresh session registry around the orchestrator.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        rounds: Arc<RoundRunner>,
        outbound_queue: usize,
    ) -> Self {
        let store = Arc::clone(orchestrator.store());
        let router = Arc::new(MessageRouter::new(
            Arc::new(SessionRegistry::new()),
            Arc::clone(&store),
        ));
        Self {
            router,
            orchestrator,
            rounds,
            store,
            public_room: PUBLIC_ROOM.to_string(),
            outbound_queue,
        }
    }

    #[must_use]
    pub fn with_public_room(mut self, room_id: &str) -> Self {
        self.public_room = room_id.to_string();
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/chat", get(ws_handler))
        .route("/health", get(http::health))
        .route("/api/conversation/private", post(http::conversation_private))
        .route("/api/conversation/room", post(http::conversation_room))
        .route("/api/round/run", post(http::round_run))
        .route("/api/round/run-batch", post(http::round_run_batch))
        .route("/api/messages/public", get(http::public_feed))
        .route("/api/messages/public/by-round", get(http::public_by_round))
        .route("/api/messages/private/{agent_id}", get(http::private_inbox))
        .route("/api/messages/room/{room_id}", get(http::room_feed))
        .route("/api/messages/session/{session_id}", get(http::session_feed))
        .route("/api/chat/group/{room_id}/messages", get(http::group_history))
        .route("/api/chat/private/messages", get(http::private_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let router = Arc::clone(&state.router);
    let capacity = state.outbound_queue;
    ws.on_upgrade(move |socket| socket::serve_connection(socket, query, router, capacity))
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "parley gateway started");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
