//! HTTP route handlers for the cart API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                               - Liveness check
//! GET    /health/ready                         - Readiness check (repository ping)
//!
//! # Cart (JSON, `{"success", "data", "message"}` envelope)
//! GET    /api/shop/cart/get/{user_id}          - Fetch a user's cart
//! POST   /api/shop/cart/add                    - Add units of a product
//! PUT    /api/shop/cart/update-cart            - Set a line's quantity
//! DELETE /api/shop/cart/{user_id}/{product_id} - Remove a line
//! POST   /api/shop/cart/merge                  - Fold a guest cart into a user's cart
//! ```

pub mod cart;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/get/{user_id}", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update-cart", put(cart::update))
        .route("/merge", post(cart::merge))
        .route("/{user_id}/{product_id}", delete(cart::remove))
}

/// Create the full application router, without middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/shop/cart", cart_routes())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the cart repository is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.carts().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
