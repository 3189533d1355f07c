//! End-to-end shopping flow through the HTTP router.
//!
//! These tests require a `PostgreSQL` database at `TEST_DATABASE_URL`.
//!
//! Run with: cargo test -p lumina-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use lumina_api::db::ReviewRepository;
use lumina_api::db::reviews::NewReview;
use lumina_integration_tests::TestDb;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_cart_to_order_to_cancel() {
    let db = TestDb::connect().await.unwrap();
    let app = db.app();
    let (user, token) = db.customer().await.unwrap();
    let address = db.address(&user).await.unwrap();
    let product = db.product(dec!(30.00), 8).await.unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/cart/items",
        &token,
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Item added to cart successfully");

    let (status, body) = call(&app, Method::GET, "/api/cart/validate", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        &token,
        Some(json!({
            "billing_address_id": address.id,
            "shipping_address_id": address.id,
            "payment_method": "paypal",
            "notes": "Leave at the door",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Order created successfully");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["subtotal"], "60.00");
    assert_eq!(body["data"]["shipping_amount"], "0.00");
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(db.product_stock(&product).await.unwrap(), 6);

    let order_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call(&app, Method::GET, "/api/cart", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items_count"], 0);

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/orders/{order_id}/tracking"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["history"].as_array().map(Vec::len), Some(1));

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/orders/{order_id}/cancel"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(db.product_stock(&product).await.unwrap(), 8);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_checkout_reports_unavailable_items() {
    let db = TestDb::connect().await.unwrap();
    let app = db.app();
    let (user, token) = db.customer().await.unwrap();
    let address = db.address(&user).await.unwrap();
    let product = db.product(dec!(12.00), 1).await.unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/cart/items",
        &token,
        Some(json!({ "product_id": product.id, "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        &token,
        Some(json!({
            "billing_address_id": address.id,
            "shipping_address_id": address.id,
            "payment_method": "credit_card",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["issues"][0]["type"], "insufficient_stock");
    assert_eq!(db.product_stock(&product).await.unwrap(), 1);
    assert_eq!(db.order_count(&user).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_customer_cannot_reach_admin_routes() {
    let db = TestDb::connect().await.unwrap();
    let app = db.app();
    let (_, token) = db.customer().await.unwrap();

    let (status, body) = call(&app, Method::GET, "/api/admin/orders", &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_wishlist_add_duplicate_and_remove() {
    let db = TestDb::connect().await.unwrap();
    let app = db.app();
    let (_, token) = db.customer().await.unwrap();
    let product = db.product(dec!(45.00), 3).await.unwrap();
    let add = || Some(json!({ "product_id": product.id }));

    let (status, body) = call(&app, Method::POST, "/api/user/wishlist", &token, add()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Product added to wishlist");
    assert_eq!(body["data"]["product"]["price"], "45.00");

    let (status, body) = call(&app, Method::POST, "/api/user/wishlist", &token, add()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Product already in wishlist");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/user/wishlist",
        &token,
        Some(json!({ "product_id": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["product_id"].is_array());

    let (status, body) = call(&app, Method::GET, "/api/user/wishlist", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = call(&app, Method::GET, "/api/user/stats", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["wishlist_count"], 1);
    assert_eq!(body["data"]["total_spent"], "0.00");

    let uri = format!("/api/user/wishlist/{}", product.id);
    let (status, body) = call(&app, Method::DELETE, &uri, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Product removed from wishlist");

    let (status, _) = call(&app, Method::DELETE, &uri, &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_viewing_products_fills_recently_viewed() {
    let db = TestDb::connect().await.unwrap();
    let app = db.app();
    let (_, token) = db.customer().await.unwrap();
    let first = db.product(dec!(10.00), 3).await.unwrap();
    let second = db.product(dec!(11.00), 3).await.unwrap();

    for product in [&first, &second, &first] {
        let uri = format!("/api/products/{}", product.id);
        let (status, _) = call(&app, Method::GET, &uri, &token, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Anonymous views are not recorded anywhere.
    let uri = format!("/api/products/{}", second.id);
    let (status, _) = call(&app, Method::GET, &uri, "", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, "/api/user/recently-viewed", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first.id.as_i64(), second.id.as_i64()]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_product_reviews_endpoint() {
    let db = TestDb::connect().await.unwrap();
    let app = db.app();
    let (user, token) = db.customer().await.unwrap();
    let product = db.product(dec!(30.00), 3).await.unwrap();

    ReviewRepository::new(&db.pool)
        .create(
            user.id,
            product.id,
            &NewReview {
                rating: 4,
                title: Some("Lovely texture"),
                comment: None,
            },
        )
        .await
        .unwrap();

    let uri = format!("/api/products/{}/reviews", product.id);
    let (status, body) = call(&app, Method::GET, &uri, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["rating"], 4);
    assert_eq!(body["data"][0]["user"]["name"], "Test Shopper");

    let (status, body) = call(&app, Method::GET, &format!("{uri}?rating=1"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/products/{}/reviews", i64::MAX),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
