pub mod v1;

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::handlers::health;

pub const HEALTH: &str = "/health";

/// Create the application router with every API version and the health
/// endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH, get(health::health))
        .merge(v1::create_v1_router())
        // Future versions can be merged here
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
