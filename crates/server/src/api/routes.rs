use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{handlers, queue, tickets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Visitor-facing routes
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/tickets", post(tickets::issue_ticket))
        .route("/tickets/{id}", get(tickets::get_ticket));

    // Front-desk routes, behind the configured authenticator
    let admin_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/queue", get(queue::list_waiting))
        .route("/queue/advance", post(queue::advance))
        .route("/tickets/{id}", delete(tickets::remove_ticket))
        .route("/tickets/{id}/removal", delete(tickets::cancel_removal))
        .route("/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(admin_routes).with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
