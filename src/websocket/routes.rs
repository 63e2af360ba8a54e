use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Json;
use std::sync::Arc;

use crate::media::streamer::{
    admin_cleanup_all_handler, admin_cleanup_handler, admin_storage_handler, error_response,
    stream_handler, upload_handler,
};
use crate::protocol::normalize_room_code;
use crate::server::SyncServer;

use super::handler::websocket_handler;

/// Create the Axum router: the WebSocket sync protocol plus the HTTP media
/// and room surfaces.
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<SyncServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    // Parse CORS origins
    let cors = if cors_origins == "*" {
        CorsLayer::permissive().expose_headers(Any)
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive().expose_headers(Any)
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([
                    header::CONTENT_LENGTH,
                    header::CONTENT_RANGE,
                    header::ACCEPT_RANGES,
                ])
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        // The media store enforces its own size cap with a 413
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/video/{key}", get(stream_handler))
        .route("/api/room/{code}", get(room_info_handler))
        .route("/api/admin/storage", get(admin_storage_handler))
        .route("/api/admin/cleanup", delete(admin_cleanup_handler))
        .route("/api/admin/cleanup-all", delete(admin_cleanup_all_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// `GET /api/room/{code}` — live-room summary, 404 once destroyed.
async fn room_info_handler(
    State(server): State<Arc<SyncServer>>,
    Path(code): Path<String>,
) -> Response {
    match server.room_info(&normalize_room_code(&code)).await {
        Some(info) => Json(info).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no such room"),
    }
}
