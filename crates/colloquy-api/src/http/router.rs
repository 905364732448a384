//! Axum router configuration with middleware.
//!
//! All session routes are under `/api/v1/`. Middleware: CORS and request
//! tracing.

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Session lifecycle
        .route(
            "/users/{user}/session",
            post(handlers::session::create_session)
                .get(handlers::session::get_session)
                .delete(handlers::session::delete_session),
        )
        .route(
            "/users/{user}/session/settings",
            patch(handlers::session::update_settings),
        )
        // Operator input
        .route("/users/{user}/messages", post(handlers::messages::send_message))
        .route("/users/{user}/events", post(handlers::messages::inject_event))
        // Cast
        .route("/users/{user}/personas", post(handlers::personas::add_persona))
        .route(
            "/users/{user}/personas/{name}",
            patch(handlers::personas::rename_persona).delete(handlers::personas::remove_persona),
        )
        // Read views
        .route(
            "/users/{user}/conversation",
            get(handlers::conversation::get_conversation),
        )
        .route("/users/{user}/stats", get(handlers::stats::get_stats))
        .route("/sessions", get(handlers::session::list_sessions));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
