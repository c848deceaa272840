//! Cart route handlers.
//!
//! Every cart response carries the user's complete cart so clients can adopt
//! it wholesale. Merge is the exception: it answers with an empty success
//! envelope and the client re-fetches.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use tracing::{info, instrument};

use newofyou_core::{
    AddLineRequest, ApiResponse, CartDocument, MergeRequest, ProductId, Quantity,
    UpdateLineRequest, UserId,
};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::state::AppState;

type CartResponse = Json<ApiResponse<CartDocument>>;

/// Reject blank identifiers before they reach the repository.
fn require_ids(user_id: &UserId, product_id: Option<&ProductId>) -> Result<()> {
    let blank_product = product_id.is_some_and(|p| p.as_str().trim().is_empty());
    if user_id.as_str().trim().is_empty() || blank_product {
        return Err(AppError::BadRequest("Invalid data provided".to_string()));
    }
    Ok(())
}

/// Fetch a user's cart. A user without lines gets an empty cart.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<CartResponse> {
    require_ids(&user_id, None)?;
    let doc = state.carts().get(&user_id).await?;
    Ok(Json(ApiResponse::ok(doc)))
}

/// Add units of a product to a user's cart.
///
/// An add that would push the line past `Quantity::MAX` is refused and the
/// cart is left as it was.
#[instrument(skip(state, payload))]
pub async fn add(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AddLineRequest>, JsonRejection>,
) -> Result<CartResponse> {
    let Json(req) = payload?;
    require_ids(&req.user_id, Some(&req.product_id))?;
    let quantity = Quantity::new(req.quantity)?;

    let doc = state
        .carts()
        .add_line(&req.user_id, &req.product_id, quantity)
        .await
        .map_err(|e| match e {
            RepositoryError::InvalidQuantity(e) => AppError::from(e),
            other => AppError::Database(other),
        })?;
    Ok(Json(ApiResponse::ok(doc)))
}

/// Set the quantity of a line already in the cart.
#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateLineRequest>, JsonRejection>,
) -> Result<CartResponse> {
    let Json(req) = payload?;
    require_ids(&req.user_id, Some(&req.product_id))?;
    let quantity = match req.quantity {
        0 => 0,
        n => Quantity::new(n)?.get(),
    };

    let doc = state
        .carts()
        .set_line_quantity(
            &req.user_id,
            &req.product_id,
            quantity,
            state.zero_quantity_policy(),
        )
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Cart item not present".to_string()),
            other => AppError::Database(other),
        })?;
    Ok(Json(ApiResponse::ok(doc)))
}

/// Remove a line. Removing a product that is not in the cart succeeds.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(UserId, ProductId)>,
) -> Result<CartResponse> {
    require_ids(&user_id, Some(&product_id))?;
    let doc = state.carts().remove_line(&user_id, &product_id).await?;
    Ok(Json(ApiResponse::ok(doc)))
}

/// Fold a guest cart into a user's cart.
///
/// A merge carrying a token already applied for this user succeeds without
/// changing the cart. Lines that would exceed `Quantity::MAX` are clamped.
#[instrument(skip(state, payload))]
pub async fn merge(
    State(state): State<AppState>,
    payload: std::result::Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Json(req) = payload?;
    require_ids(&req.user_id, None)?;
    if let Some(line) = req
        .cart_items
        .iter()
        .find(|l| l.product_id.as_str().trim().is_empty())
    {
        return Err(AppError::BadRequest(format!(
            "Invalid cart item for product '{}'",
            line.product_id
        )));
    }

    let applied = state
        .carts()
        .merge(&req.user_id, req.merge_token, &req.cart_items)
        .await?;

    if applied {
        info!(user_id = %req.user_id, lines = req.cart_items.len(), "Guest cart merged");
    } else {
        info!(user_id = %req.user_id, "Duplicate merge ignored");
    }
    Ok(Json(ApiResponse::done()))
}
