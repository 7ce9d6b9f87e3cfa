//! API Server
//!
//! HTTP and WebSocket front end for the Ragroute engine.
//!
//! # Endpoints
//!
//! - POST /api/v1/chat - Answer a question
//! - GET /api/v1/visualization/ws/:session_id - Live process events for a session
//! - GET /api/v1/visualization/events/:session_id - Recorded events for a session
//! - DELETE /api/v1/visualization/events/:session_id - Clear a session's events
//! - GET /api/v1/visualization/sessions - Sessions that hold events
//! - GET /api/v1/health - Liveness
//! - GET /api/v1/health/ready - Readiness

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ragroute_engine::events::SessionEventStore;
use ragroute_engine::service::{ChatRequest, ChatResponse, ChatService};
use sdk::errors::{EngineError, ErrorExt};
use sdk::events::{FeedControl, FeedRequest, ProcessEvent};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    service: Arc<ChatService>,
    store: Arc<SessionEventStore>,
}

impl AppState {
    /// Share the service's own event store with the event-feed endpoints
    pub fn new(service: Arc<ChatService>) -> Self {
        let store = service.event_store();
        Self { service, store }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/health/ready", get(ready_handler))
        .route("/api/v1/chat", post(chat_handler))
        .route(
            "/api/v1/visualization/ws/:session_id",
            get(websocket_handler),
        )
        .route(
            "/api/v1/visualization/events/:session_id",
            get(get_events_handler).delete(clear_events_handler),
        )
        .route("/api/v1/visualization/sessions", get(sessions_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API server
pub struct APIServer {
    state: AppState,
    addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl APIServer {
    /// Create a new APIServer instance
    pub fn new(service: Arc<ChatService>) -> Self {
        Self {
            state: AppState::new(service),
            addr: None,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind and serve in the background; returns the bound address
    ///
    /// Binding port 0 picks a free port.
    pub async fn start(&mut self, bind: SocketAddr) -> Result<SocketAddr, EngineError> {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", bind, e)))?;

        let addr = listener
            .local_addr()
            .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;

        let app = router(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tracing::info!("API server listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                    tracing::info!("API server shutting down gracefully");
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("API server error: {}", e);
                });
        });

        self.addr = Some(addr);
        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        Ok(addr)
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    ///
    /// Open WebSockets hold the server open until their clients disconnect.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("API server task failed: {}", e);
            }
            tracing::info!("API server stopped");
        }
    }
}

fn error_response(status: StatusCode, err: &EngineError) -> Response {
    (
        status,
        Json(json!({
            "detail": err.to_string(),
            "user_hint": err.user_hint()
        })),
    )
        .into_response()
}

/// Chat endpoint
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, Response> {
    if request.question.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Missing 'question' field"})),
        )
            .into_response());
    }

    match state.service.handle(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!("Error processing chat request: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, &e))
        }
    }
}

/// WebSocket upgrade for a session's event feed
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, session_id, state.store))
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize feed message: {}", e);
            true
        }
    }
}

/// Stream a session's events until either side goes away
async fn handle_websocket(mut socket: WebSocket, session_id: String, store: Arc<SessionEventStore>) {
    tracing::info!("WebSocket connection opened for session: {}", session_id);

    let (backlog, mut subscription) = store.subscribe_with_backlog(&session_id).await;

    let mut open = true;
    for event in &backlog {
        if !send_json(&mut socket, event).await {
            open = false;
            break;
        }
    }

    while open {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        open = handle_feed_request(&mut socket, &session_id, &store, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("WebSocket disconnected for session: {}", session_id);
                        open = false;
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        open = false;
                    }
                    _ => {}
                }
            }
            event = subscription.receiver.recv() => {
                match event {
                    Some(event) => open = send_json(&mut socket, &event).await,
                    None => {
                        // The store dropped us for falling behind
                        tracing::warn!("Event feed for session {} fell behind, closing", session_id);
                        open = false;
                    }
                }
            }
        }
    }

    store.unsubscribe(&session_id, subscription.id).await;
    tracing::info!("WebSocket connection closed for session: {}", session_id);
}

/// Answer one client message; returns false once the socket is unusable
async fn handle_feed_request(
    socket: &mut WebSocket,
    session_id: &str,
    store: &SessionEventStore,
    text: &str,
) -> bool {
    match serde_json::from_str::<FeedRequest>(text) {
        Ok(FeedRequest::Ping) => send_json(socket, &FeedControl::Pong).await,
        Ok(FeedRequest::GetEvents) => {
            let events = store.get_events(session_id).await;
            send_json(socket, &FeedControl::SessionEvents { events }).await
        }
        Err(_) => {
            tracing::warn!("Ignoring unrecognized WebSocket message: {}", text);
            true
        }
    }
}

/// Recorded events for a session
async fn get_events_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Vec<ProcessEvent>> {
    Json(state.store.get_events(&session_id).await)
}

/// Clear a session's events
async fn clear_events_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    let cleared = state.store.clear(&session_id).await;
    Json(json!({
        "message": format!("Events cleared for session {}", session_id),
        "cleared": cleared
    }))
}

/// Sessions that currently hold events
async fn sessions_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "active_sessions": state.store.sessions().await }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "ragroute-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn index_handler() -> Json<serde_json::Value> {
    Json(json!({"message": "Welcome to the Ragroute API"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_hint() {
        let response = error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &EngineError::Oracle("boom".to_string()),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_feed_request_parsing() {
        assert!(matches!(
            serde_json::from_str::<FeedRequest>(r#"{"type":"ping"}"#),
            Ok(FeedRequest::Ping)
        ));
        assert!(serde_json::from_str::<FeedRequest>(r#"{"type":"dance"}"#).is_err());
    }
}
