//! Guest cart, login merge and logout against the cart API.
//!
//! The API runs in-process over an in-memory repository; no external
//! services are needed.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use newofyou_core::{CartLine, CartSnapshot, MergeToken, ProductId, Quantity, UserId, ZeroQuantityPolicy};
use newofyou_integration_tests::TestServer;
use newofyou_storefront::{
    CartError, CartSession, CartStore, FileStorage, HttpCartClient, LocalStorage, MemoryStorage,
    MergeOutcome, RemoteCart, keys,
};

fn session<L: LocalStorage>(local: L, server: &TestServer) -> CartSession<L, HttpCartClient> {
    let store = CartStore::load(local, server.client(), ZeroQuantityPolicy::Remove)
        .expect("Failed to load cart store");
    CartSession::new(store)
}

fn quantity(n: u32) -> Quantity {
    Quantity::new(i64::from(n)).expect("valid quantity")
}

#[tokio::test]
async fn test_login_merges_guest_cart_into_server_cart() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let user = UserId::new("u1");
    let remote = server.client();
    remote.add_line(&user, &ProductId::new("P1"), quantity(1)).await.unwrap();
    remote.add_line(&user, &ProductId::new("P2"), quantity(2)).await.unwrap();

    let local = Arc::new(MemoryStorage::new());
    let mut session = session(Arc::clone(&local), &server);
    session.add_line(ProductId::new("P1"), 2).await.unwrap();
    session.add_line(ProductId::new("P1"), 3).await.unwrap();

    let outcome = session.login(user.clone()).await.unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { lines: 1 });

    let expected = CartSnapshot::from_lines([CartLine::new("P1", 6), CartLine::new("P2", 2)]);
    assert!(session.snapshot().await.same_lines(&expected));
    assert!(remote.fetch(&user).await.unwrap().same_lines(&expected));
    assert!(local.get(keys::CART).unwrap().is_none());
    assert!(local.get(keys::PENDING_MERGE).unwrap().is_none());
    assert!(!session.has_pending_merge().unwrap());
}

#[tokio::test]
async fn test_authenticated_mutations_adopt_server_cart() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let mut session = session(MemoryStorage::new(), &server);
    session.login(UserId::new("u1")).await.unwrap();

    let cart = session.add_line(ProductId::new("P1"), 2).await.unwrap();
    assert_eq!(cart, CartSnapshot::from_lines([CartLine::new("P1", 2)]));

    let cart = session
        .update_line_quantity(ProductId::new("P1"), 5)
        .await
        .unwrap();
    assert_eq!(cart, CartSnapshot::from_lines([CartLine::new("P1", 5)]));

    let cart = session
        .update_line_quantity(ProductId::new("P1"), 0)
        .await
        .unwrap();
    assert!(cart.is_empty());
    assert!(session.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_update_missing_line_is_rejected_and_cart_unchanged() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let mut session = session(MemoryStorage::new(), &server);
    session.login(UserId::new("u1")).await.unwrap();
    session.add_line(ProductId::new("P1"), 1).await.unwrap();

    let err = session
        .update_line_quantity(ProductId::new("P9"), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::RemoteUnavailable(_)));
    assert!(!err.is_retryable());
    assert_eq!(
        session.snapshot().await,
        CartSnapshot::from_lines([CartLine::new("P1", 1)])
    );
}

#[tokio::test]
async fn test_negative_quantity_never_reaches_server() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let mut session = session(MemoryStorage::new(), &server);
    session.login(UserId::new("u1")).await.unwrap();

    let err = session.add_line(ProductId::new("P1"), -1).await.unwrap_err();
    assert!(matches!(err, CartError::InvalidQuantity(_)));
    assert!(server.client().fetch(&UserId::new("u1")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_merge_token_is_applied_once() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let user = UserId::new("u1");
    let remote = server.client();
    let lines = [CartLine::new("P1", 4)];
    let token = MergeToken::generate();

    remote.merge(&user, &lines, token).await.unwrap();
    remote.merge(&user, &lines, token).await.unwrap();

    assert_eq!(
        remote.fetch(&user).await.unwrap(),
        CartSnapshot::from_lines([CartLine::new("P1", 4)])
    );

    remote.merge(&user, &lines, MergeToken::generate()).await.unwrap();
    assert_eq!(
        remote.fetch(&user).await.unwrap(),
        CartSnapshot::from_lines([CartLine::new("P1", 8)])
    );
}

#[tokio::test]
async fn test_failed_login_merge_keeps_guest_cart_for_retry() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let dir = tempfile::tempdir().unwrap();
    let user = UserId::new("u1");

    // Guest cart written while the API is down.
    let offline = {
        let mut config = server.remote_config();
        config.base_url = url::Url::parse("http://127.0.0.1:9").unwrap();
        HttpCartClient::new(&config).unwrap()
    };
    let store = CartStore::load(
        FileStorage::open(dir.path()).unwrap(),
        offline,
        ZeroQuantityPolicy::Remove,
    )
    .unwrap();
    let mut session = CartSession::new(store);
    session.add_line(ProductId::new("P1"), 2).await.unwrap();

    let err = session.login(user.clone()).await.unwrap_err();
    assert!(err.is_merge_failure());
    assert!(session.has_pending_merge().unwrap());
    drop(session);

    // Next run reaches the API and retries with the stored record.
    let store = CartStore::load(
        FileStorage::open(dir.path()).unwrap(),
        server.client(),
        ZeroQuantityPolicy::Remove,
    )
    .unwrap();
    let mut session =
        CartSession::with_context(store, newofyou_core::SessionContext::authenticated(user.clone()));
    assert_eq!(
        session.retry_merge().await.unwrap(),
        MergeOutcome::Merged { lines: 1 }
    );
    assert_eq!(
        session.snapshot().await,
        CartSnapshot::from_lines([CartLine::new("P1", 2)])
    );
    assert!(!session.has_pending_merge().unwrap());
}

#[tokio::test]
async fn test_logout_after_merge_starts_empty_guest_cart() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let mut session = session(MemoryStorage::new(), &server);
    session.add_line(ProductId::new("P1"), 1).await.unwrap();
    session.login(UserId::new("u1")).await.unwrap();

    let guest = session.logout().await.unwrap();
    assert!(guest.is_empty());
    assert!(session.context().user_id().is_none());

    let cart = session.add_line(ProductId::new("P2"), 1).await.unwrap();
    assert_eq!(cart, CartSnapshot::from_lines([CartLine::new("P2", 1)]));
    assert_eq!(
        server.client().fetch(&UserId::new("u1")).await.unwrap(),
        CartSnapshot::from_lines([CartLine::new("P1", 1)])
    );
}

#[tokio::test]
async fn test_full_guest_line_still_merges_on_login() {
    let server = TestServer::cart_api(ZeroQuantityPolicy::Remove).await;
    let user = UserId::new("u1");
    server
        .client()
        .add_line(&user, &ProductId::new("P1"), quantity(5_000))
        .await
        .unwrap();

    let local = Arc::new(MemoryStorage::new());
    let mut session = session(Arc::clone(&local), &server);
    session
        .add_line(ProductId::new("P1"), i64::from(Quantity::MAX))
        .await
        .unwrap();

    let err = session.add_line(ProductId::new("P1"), 1).await.unwrap_err();
    assert!(matches!(err, CartError::InvalidQuantity(_)));
    assert_eq!(
        session.snapshot().await,
        CartSnapshot::from_lines([CartLine::new("P1", Quantity::MAX)])
    );

    let outcome = session.login(user.clone()).await.unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { lines: 1 });
    let expected = CartSnapshot::from_lines([CartLine::new("P1", Quantity::MAX)]);
    assert_eq!(session.snapshot().await, expected);
    assert_eq!(server.client().fetch(&user).await.unwrap(), expected);
    assert!(local.get(keys::CART).unwrap().is_none());

    let err = session.add_line(ProductId::new("P1"), 1).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(session.snapshot().await, expected);
}
