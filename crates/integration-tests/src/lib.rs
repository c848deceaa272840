//! Integration tests for the New of You cart.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (cart API on an ephemeral port, in-memory carts)
//! cargo test -p newofyou-integration-tests
//!
//! # PostgreSQL repository tests
//! TEST_DATABASE_URL=postgres://... cargo test -p newofyou-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_session` - Guest cart, login merge and logout against the HTTP API
//! - `cart_api` - Wire behavior of the cart API as seen by the HTTP client
//! - `postgres` - `PgCartRepository` against a real database

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use url::Url;

use newofyou_api::AppState;
use newofyou_api::db::MemoryCartRepository;
use newofyou_api::routes;
use newofyou_core::ZeroQuantityPolicy;
use newofyou_storefront::{HttpCartClient, RemoteConfig};

/// A router served on an ephemeral local port for the lifetime of the value.
pub struct TestServer {
    base_url: Url,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Serve `app` on `127.0.0.1` with an OS-assigned port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let base_url = Url::parse(&format!("http://{addr}")).expect("Invalid test server URL");
        Self { base_url, handle }
    }

    /// Serve the cart API over an in-memory repository.
    pub async fn cart_api(policy: ZeroQuantityPolicy) -> Self {
        let state = AppState::new(Arc::new(MemoryCartRepository::new()), policy);
        Self::spawn(routes::router(state)).await
    }

    /// Base URL of the server.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client settings pointing at this server, with a short backoff.
    #[must_use]
    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(10),
        }
    }

    /// HTTP cart client pointing at this server.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client(&self) -> HttpCartClient {
        HttpCartClient::new(&self.remote_config()).expect("Failed to build cart client")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
