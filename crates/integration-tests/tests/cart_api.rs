//! Cart API behavior as seen through the HTTP client.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};

use newofyou_core::{CartLine, CartSnapshot, ProductId, Quantity, UserId, ZeroQuantityPolicy};
use newofyou_integration_tests::TestServer;
use newofyou_storefront::{RemoteCart, RemoteError};

fn quantity(n: u32) -> Quantity {
    Quantity::new(i64::from(n)).expect("valid quantity")
}

/// A cart API that answers `fail_first` requests with `status` before succeeding.
async fn flaky_server(fail_first: usize, status: StatusCode) -> (TestServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/api/shop/cart/get/{user_id}",
            get(
                move |State(calls): State<Arc<AtomicUsize>>| async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < fail_first {
                        return (status, Json(json!({ "success": false, "message": "busy" })));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "success": true,
                            "data": {
                                "userId": "u1",
                                "items": [{ "productId": "P1", "quantity": 3 }]
                            }
                        })),
                    )
                },
            ),
        )
        .with_state(Arc::clone(&calls));
    (TestServer::spawn(app).await, calls)
}

#[tokio::test]
async fn test_fetch_retries_once_after_unavailable() {
    let (server, calls) = flaky_server(1, StatusCode::SERVICE_UNAVAILABLE).await;

    let cart = server.client().fetch(&UserId::new("u1")).await.unwrap();
    assert_eq!(cart, CartSnapshot::from_lines([CartLine::new("P1", 3)]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fetch_gives_up_after_one_retry() {
    let (server, calls) = flaky_server(5, StatusCode::SERVICE_UNAVAILABLE).await;

    let err = server.client().fetch(&UserId::new("u1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
    assert!(err.is_transient());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_internal_error_is_not_retried() {
    let (server, calls) = flaky_server(5, StatusCode::INTERNAL_SERVER_ERROR).await;

    let err = server.client().fetch(&UserId::new("u1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_absent_line_is_rejected_with_message() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;

    let err = server
        .client()
        .set_line_quantity(&UserId::new("u1"), &ProductId::new("P1"), 2)
        .await
        .unwrap_err();
    match err {
        RemoteError::Rejected { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Cart item not present");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_keep_policy_server_keeps_zero_line() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Keep).await;
    let client = server.client();
    let user = UserId::new("u1");
    client.add_line(&user, &ProductId::new("P1"), quantity(2)).await.unwrap();

    let cart = client
        .set_line_quantity(&user, &ProductId::new("P1"), 0)
        .await
        .unwrap();
    assert_eq!(cart, CartSnapshot::from_lines([CartLine::new("P1", 0)]));
}

#[tokio::test]
async fn test_remove_absent_line_succeeds() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let client = server.client();
    let user = UserId::new("u1");

    let cart = client.remove_line(&user, &ProductId::new("P1")).await.unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_wire_format() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let http = reqwest::Client::new();
    let base = server.base_url().as_str().trim_end_matches('/').to_owned();

    let body: Value = http
        .post(format!("{base}/api/shop/cart/add"))
        .json(&json!({ "userId": "u1", "productId": "P1", "quantity": 2 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["userId"], "u1");
    assert_eq!(body["data"]["items"], json!([{ "productId": "P1", "quantity": 2 }]));

    let response = http
        .post(format!("{base}/api/shop/cart/merge"))
        .json(&json!({
            "userId": "u1",
            "cartItems": [{ "productId": "P1", "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let response = http
        .put(format!("{base}/api/shop/cart/update-cart"))
        .json(&json!({ "userId": "u1", "productId": "P1", "quantity": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
