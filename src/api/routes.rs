//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_attr_handler, get_attr_handler, get_player_handler, health_handler, import_handler,
    put_attr_handler, register_object_handler, set_money_handler, stats_handler, sync_handler,
    write_protect_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /attr/:object/:attr` - Read an attribute
/// - `PUT /attr` - Write an attribute
/// - `DELETE /attr/:object/:attr` - Delete an attribute
/// - `GET /player/:id` - Player money and queue accounting
/// - `PUT /player/:id/money` - Set a player's money
/// - `PUT /objects/:id` - Register an object
/// - `POST /admin/sync` - Flush players and sync the store
/// - `PUT /admin/write-protect` - Raise or lower write protection
/// - `POST /admin/import` - Bulk-load attribute writes
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/attr", put(put_attr_handler))
        .route(
            "/attr/:object/:attr",
            get(get_attr_handler).delete(delete_attr_handler),
        )
        .route("/player/:id", get(get_player_handler))
        .route("/player/:id/money", put(set_money_handler))
        .route("/objects/:id", put(register_object_handler))
        .route("/admin/sync", post(sync_handler))
        .route("/admin/write-protect", put(write_protect_handler))
        .route("/admin/import", post(import_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
