//! Catalog search and product reviews against a real database.
//!
//! These tests require a `PostgreSQL` database at `TEST_DATABASE_URL`.
//!
//! Run with: cargo test -p lumina-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use lumina_api::db::orders::{NewOrder, StatusUpdate};
use lumina_api::db::reviews::NewReview;
use lumina_api::db::{CartRepository, CatalogRepository, OrderRepository, ReviewRepository};
use lumina_core::{OrderStatus, PaymentMethod};
use lumina_integration_tests::{TestDb, unique};
use rust_decimal_macros::dec;

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_search_treats_wildcards_literally() {
    let db = TestDb::connect().await.unwrap();
    let tag = unique();

    let percent = db
        .named_product(&format!("{tag} 100% Serum"), dec!(20.00), 5)
        .await
        .unwrap();
    db.named_product(&format!("{tag} 1000 Serum"), dec!(20.00), 5)
        .await
        .unwrap();
    let underscore = db
        .named_product(&format!("{tag}_mist"), dec!(9.00), 5)
        .await
        .unwrap();
    db.named_product(&format!("{tag}Xmist"), dec!(9.00), 5)
        .await
        .unwrap();

    let catalog = CatalogRepository::new(&db.pool);

    let found = catalog.search(&format!("{tag} 100%"), 10).await.unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![percent.id]);

    let found = catalog.search(&format!("{tag}_"), 10).await.unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![underscore.id]);

    let found = catalog.search(&tag, 10).await.unwrap();
    assert_eq!(found.len(), 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_reviews_refresh_rating_and_mark_verified_buyers() {
    let db = TestDb::connect().await.unwrap();
    let product = db.product(dec!(24.00), 10).await.unwrap();
    let (buyer, _) = db.customer().await.unwrap();
    let (browser, _) = db.customer().await.unwrap();
    let address = db.address(&buyer).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(buyer.id).await.unwrap();
    carts
        .add_item(cart.id, product.id, None, 1, product.price)
        .await
        .unwrap();
    let orders = OrderRepository::new(&db.pool);
    let order = orders
        .place_order(
            buyer.id,
            &NewOrder {
                billing_address_id: address.id,
                shipping_address_id: address.id,
                payment_method: PaymentMethod::Paypal,
                notes: None,
            },
        )
        .await
        .unwrap();
    orders
        .update_status(
            order.id,
            &StatusUpdate {
                status: OrderStatus::Delivered,
                tracking_number: None,
                carrier: None,
                note: None,
            },
        )
        .await
        .unwrap();

    let reviews = ReviewRepository::new(&db.pool);
    let verified = reviews
        .create(
            buyer.id,
            product.id,
            &NewReview {
                rating: 5,
                title: Some("Holy grail"),
                comment: Some("Cleared my skin in a week."),
            },
        )
        .await
        .unwrap();
    assert!(verified.is_verified_purchase);
    assert_eq!(verified.user.id, buyer.id);

    let unverified = reviews
        .create(
            browser.id,
            product.id,
            &NewReview {
                rating: 2,
                title: None,
                comment: Some("Too sticky for me."),
            },
        )
        .await
        .unwrap();
    assert!(!unverified.is_verified_purchase);

    let refreshed = CatalogRepository::new(&db.pool)
        .get_product(product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.review_count, 2);
    assert_eq!(refreshed.rating, dec!(3.50));

    let all = reviews.list_for_product(product.id, None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, unverified.id);

    let five_star = reviews
        .list_for_product(product.id, Some(5), 10, 0)
        .await
        .unwrap();
    assert_eq!(five_star.len(), 1);
    assert_eq!(five_star[0].id, verified.id);
}
