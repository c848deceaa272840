//! HTTP client for the cart API.
//!
//! JSON over `reqwest`. Each attempt is bounded by the configured timeout and
//! a failed attempt is retried once after a short backoff when the failure is
//! transient. Adding a line is not idempotent, so it is only retried when the
//! request never reached the server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use newofyou_core::{
    AddLineRequest, ApiResponse, CartDocument, CartLine, CartSnapshot, MergeRequest, MergeToken,
    ProductId, Quantity, UpdateLineRequest, UserId,
};

use super::{RemoteCart, RemoteError};
use crate::config::RemoteConfig;

/// Attempts per request, including the first.
const MAX_ATTEMPTS: u32 = 2;

/// Which failures a request may be retried after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryMode {
    /// Only when the connection was never established.
    ConnectOnly,
    /// Connection errors, timeouts and gateway/unavailable responses.
    Transient,
}

/// Client for the cart REST API.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    base_url: Url,
    retry_backoff: Duration,
}

impl HttpCartClient {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Unavailable` if the HTTP client cannot be built
    /// or the base URL cannot carry a path.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        if config.base_url.cannot_be_a_base() {
            return Err(RemoteError::Unavailable(format!(
                "base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(HttpCartClientInner {
                client,
                base_url: config.base_url.clone(),
                retry_backoff: config.retry_backoff,
            }),
        })
    }

    /// Build `<base>/api/shop/cart/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Unavailable("base URL cannot carry a path".to_owned()))?
            .pop_if_empty()
            .extend(["api", "shop", "cart"])
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying once on transient failures, and unwrap the envelope.
    async fn send<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        retry: RetryMode,
    ) -> Result<Option<T>, RemoteError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let build = || -> RequestBuilder {
            let request = self.inner.client.request(method.clone(), url.clone());
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        };

        let mut attempt = 1;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if retry == RetryMode::Transient
                        && is_retryable_status(status)
                        && attempt < MAX_ATTEMPTS
                    {
                        warn!(%status, %url, attempt, "Cart API unavailable, retrying");
                        tokio::time::sleep(self.inner.retry_backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return decode_response(status, response).await;
                }
                Err(e) => {
                    let retryable = match retry {
                        RetryMode::ConnectOnly => e.is_connect(),
                        RetryMode::Transient => e.is_connect() || e.is_timeout(),
                    };
                    if retryable && attempt < MAX_ATTEMPTS {
                        warn!(error = %e, %url, attempt, "Cart API request failed, retrying");
                        tokio::time::sleep(self.inner.retry_backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(RemoteError::Unavailable(e.to_string()));
                }
            }
        }
    }

    /// Send a request whose success response carries a cart document.
    async fn send_for_cart<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        retry: RetryMode,
    ) -> Result<CartSnapshot, RemoteError> {
        let document: Option<CartDocument> = self.send(method, url, body, retry).await?;
        document
            .map(|doc| doc.items)
            .ok_or_else(|| RemoteError::Decode("response carried no cart".to_owned()))
    }
}

/// Statuses worth one more attempt.
const fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Turn an HTTP response into the envelope payload or a `RemoteError`.
async fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    response: reqwest::Response,
) -> Result<Option<T>, RemoteError> {
    let text = response
        .text()
        .await
        .map_err(|e| RemoteError::Unavailable(format!("failed to read response body: {e}")))?;

    if status.is_server_error() {
        return Err(RemoteError::Unavailable(format!(
            "HTTP {status}: {}",
            text.chars().take(200).collect::<String>()
        )));
    }

    if !status.is_success() {
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
            .ok()
            .and_then(|r| r.message)
            .unwrap_or_else(|| text.chars().take(200).collect());
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
        debug!(error = %e, body = %text.chars().take(500).collect::<String>(), "Unparseable cart response");
        RemoteError::Decode(e.to_string())
    })?;

    if !envelope.success {
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "request unsuccessful".to_owned()),
        });
    }

    Ok(envelope.data)
}

#[async_trait]
impl RemoteCart for HttpCartClient {
    #[instrument(skip(self))]
    async fn fetch(&self, user_id: &UserId) -> Result<CartSnapshot, RemoteError> {
        let url = self.endpoint(&["get", user_id.as_str()])?;
        self.send_for_cart::<()>(Method::GET, url, None, RetryMode::Transient)
            .await
    }

    #[instrument(skip(self))]
    async fn add_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, RemoteError> {
        let url = self.endpoint(&["add"])?;
        let body = AddLineRequest {
            user_id: user_id.clone(),
            product_id: product_id.clone(),
            quantity: i64::from(quantity.get()),
        };
        self.send_for_cart(Method::POST, url, Some(&body), RetryMode::ConnectOnly)
            .await
    }

    #[instrument(skip(self))]
    async fn set_line_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError> {
        let url = self.endpoint(&["update-cart"])?;
        let body = UpdateLineRequest {
            user_id: user_id.clone(),
            product_id: product_id.clone(),
            quantity: i64::from(quantity),
        };
        self.send_for_cart(Method::PUT, url, Some(&body), RetryMode::Transient)
            .await
    }

    #[instrument(skip(self))]
    async fn remove_line(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, RemoteError> {
        let url = self.endpoint(&[user_id.as_str(), product_id.as_str()])?;
        self.send_for_cart::<()>(Method::DELETE, url, None, RetryMode::Transient)
            .await
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn merge(
        &self,
        user_id: &UserId,
        lines: &[CartLine],
        token: MergeToken,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["merge"])?;
        let body = MergeRequest {
            user_id: user_id.clone(),
            cart_items: lines.to_vec(),
            merge_token: Some(token),
        };
        // Tokened merges are applied at most once, so a timeout is safe to retry.
        self.send::<serde_json::Value, _>(Method::POST, url, Some(&body), RetryMode::Transient)
            .await
            .map(|_| ())
    }
}
