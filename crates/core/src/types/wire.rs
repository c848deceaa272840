//! JSON bodies exchanged between the storefront and the cart API.
//!
//! ```text
//! GET    /api/shop/cart/get/{user_id}           -> ApiResponse<CartDocument>
//! POST   /api/shop/cart/add          AddLineRequest    -> ApiResponse<CartDocument>
//! PUT    /api/shop/cart/update-cart  UpdateLineRequest -> ApiResponse<CartDocument>
//! DELETE /api/shop/cart/{user_id}/{product_id}  -> ApiResponse<CartDocument>
//! POST   /api/shop/cart/merge        MergeRequest      -> ApiResponse<()>
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CartLine, CartSnapshot, MergeToken, ProductId, UserId};

/// Response envelope used by every cart endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// A failed response with a human-readable message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    /// A successful response with no payload.
    #[must_use]
    pub const fn done() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
        }
    }
}

/// A user's server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDocument {
    pub user_id: UserId,
    pub items: CartSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/shop/cart/add`.
///
/// Quantities travel as plain integers so the server can answer a
/// non-positive value with a 400 rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Body of `PUT /api/shop/cart/update-cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLineRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Body of `POST /api/shop/cart/merge`.
///
/// Requests without a `mergeToken` are applied every time they arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub user_id: UserId,
    pub cart_items: Vec<CartLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_token: Option<MergeToken>,
}
