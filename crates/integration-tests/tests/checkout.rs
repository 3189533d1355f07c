//! Checkout and cancellation against a real database.
//!
//! These tests require a `PostgreSQL` database at `TEST_DATABASE_URL`.
//!
//! Run with: cargo test -p lumina-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use lumina_api::db::orders::{NewOrder, PlaceOrderError, StatusUpdate};
use lumina_api::db::{CartRepository, OrderRepository, RepositoryError};
use lumina_api::models::{Address, User};
use lumina_core::{CartIssueKind, CheckoutError, OrderStatus, OrderTotals, PaymentMethod};
use lumina_integration_tests::TestDb;
use rust_decimal_macros::dec;

fn new_order(address: &Address) -> NewOrder<'static> {
    NewOrder {
        billing_address_id: address.id,
        shipping_address_id: address.id,
        payment_method: PaymentMethod::CreditCard,
        notes: None,
    }
}

async fn shopper(db: &TestDb) -> (User, Address) {
    let (user, _) = db.customer().await.unwrap();
    let address = db.address(&user).await.unwrap();
    (user, address)
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_checkout_decrements_exact_stock_and_empties_cart() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;

    let cleanser = db.product(dec!(12.50), 10).await.unwrap();
    let lipstick = db.product(dec!(18.00), 40).await.unwrap();
    let shade = db.variant(&lipstick, dec!(20.00), 5).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, cleanser.id, None, 3, cleanser.price)
        .await
        .unwrap();
    carts
        .add_item(cart.id, lipstick.id, Some(shade.id), 2, shade.price)
        .await
        .unwrap();

    let orders = OrderRepository::new(&db.pool);
    let order = orders.place_order(user.id, &new_order(&address)).await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("ORD-"));

    // Variant lines draw from the variant only.
    assert_eq!(db.product_stock(&cleanser).await.unwrap(), 7);
    assert_eq!(db.variant_stock(&shade).await.unwrap(), 3);
    assert_eq!(db.product_stock(&lipstick).await.unwrap(), 40);

    assert!(carts.lines(user.id).await.unwrap().is_empty());

    let items = orders.items(order.id).await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_order_totals_follow_pricing_rules() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;
    let serum = db.product(dec!(12.50), 10).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, serum.id, None, 3, serum.price)
        .await
        .unwrap();

    let order = OrderRepository::new(&db.pool)
        .place_order(user.id, &new_order(&address))
        .await
        .unwrap();

    let expected = OrderTotals::from_subtotal(dec!(37.50));
    assert_eq!(order.subtotal, dec!(37.50));
    assert_eq!(order.tax_amount, dec!(3.00));
    assert_eq!(order.shipping_amount, dec!(5.99));
    assert_eq!(order.total_amount, expected.total_amount);
    assert_eq!(
        order.total_amount,
        order.subtotal + order.tax_amount + order.shipping_amount
    );
    assert_eq!(order.currency, "USD");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_insufficient_stock_leaves_everything_untouched() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;

    let plenty = db.product(dec!(10.00), 50).await.unwrap();
    let scarce = db.product(dec!(30.00), 2).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, plenty.id, None, 4, plenty.price)
        .await
        .unwrap();
    carts
        .add_item(cart.id, scarce.id, None, 3, scarce.price)
        .await
        .unwrap();

    let err = OrderRepository::new(&db.pool)
        .place_order(user.id, &new_order(&address))
        .await
        .unwrap_err();

    let PlaceOrderError::Checkout(CheckoutError::Unavailable(issues)) = err else {
        panic!("expected unavailable items, got {err:?}");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, CartIssueKind::InsufficientStock);

    assert_eq!(db.product_stock(&plenty).await.unwrap(), 50);
    assert_eq!(db.product_stock(&scarce).await.unwrap(), 2);
    assert_eq!(carts.lines(user.id).await.unwrap().len(), 2);
    assert_eq!(db.order_count(&user).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_empty_cart_cannot_be_checked_out() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;

    let err = OrderRepository::new(&db.pool)
        .place_order(user.id, &new_order(&address))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlaceOrderError::Checkout(CheckoutError::EmptyCart)
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_foreign_address_is_rejected() {
    let db = TestDb::connect().await.unwrap();
    let (user, _) = shopper(&db).await;
    let (_, stranger_address) = shopper(&db).await;
    let product = db.product(dec!(15.00), 5).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, product.id, None, 1, product.price)
        .await
        .unwrap();

    let err = OrderRepository::new(&db.pool)
        .place_order(user.id, &new_order(&stranger_address))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaceOrderError::AddressNotFound));
    assert_eq!(db.product_stock(&product).await.unwrap(), 5);
    assert_eq!(carts.lines(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_cancel_restores_stock_once() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;

    let product = db.product(dec!(9.99), 6).await.unwrap();
    let parent = db.product(dec!(40.00), 10).await.unwrap();
    let variant = db.variant(&parent, dec!(45.00), 4).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, product.id, None, 2, product.price)
        .await
        .unwrap();
    carts
        .add_item(cart.id, parent.id, Some(variant.id), 3, variant.price)
        .await
        .unwrap();

    let orders = OrderRepository::new(&db.pool);
    let order = orders.place_order(user.id, &new_order(&address)).await.unwrap();
    assert_eq!(db.product_stock(&product).await.unwrap(), 4);
    assert_eq!(db.variant_stock(&variant).await.unwrap(), 1);

    let cancelled = orders.cancel(user.id, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(db.product_stock(&product).await.unwrap(), 6);
    assert_eq!(db.variant_stock(&variant).await.unwrap(), 4);

    let again = orders.cancel(user.id, order.id).await;
    assert!(matches!(again, Err(RepositoryError::NotFound)));
    assert_eq!(db.product_stock(&product).await.unwrap(), 6);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_other_users_cannot_cancel() {
    let db = TestDb::connect().await.unwrap();
    let (owner, address) = shopper(&db).await;
    let (intruder, _) = shopper(&db).await;
    let product = db.product(dec!(20.00), 3).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(owner.id).await.unwrap();
    carts
        .add_item(cart.id, product.id, None, 1, product.price)
        .await
        .unwrap();

    let orders = OrderRepository::new(&db.pool);
    let order = orders.place_order(owner.id, &new_order(&address)).await.unwrap();

    let result = orders.cancel(intruder.id, order.id).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
    assert_eq!(db.product_stock(&product).await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_concurrent_checkouts_never_oversell() {
    let db = TestDb::connect().await.unwrap();
    let (first, first_address) = shopper(&db).await;
    let (second, second_address) = shopper(&db).await;
    let last_unit = db.product(dec!(55.00), 1).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    for user in [&first, &second] {
        let cart = carts.get_or_create(user.id).await.unwrap();
        carts
            .add_item(cart.id, last_unit.id, None, 1, last_unit.price)
            .await
            .unwrap();
    }

    let orders = OrderRepository::new(&db.pool);
    let first_order = new_order(&first_address);
    let second_order = new_order(&second_address);
    let (a, b) = tokio::join!(
        orders.place_order(first.id, &first_order),
        orders.place_order(second.id, &second_order),
    );

    assert_eq!(
        usize::from(a.is_ok()) + usize::from(b.is_ok()),
        1,
        "exactly one checkout should win"
    );
    assert_eq!(db.product_stock(&last_unit).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_admin_status_changes_track_and_restock() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;
    let product = db.product(dec!(25.00), 10).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, product.id, None, 4, product.price)
        .await
        .unwrap();

    let orders = OrderRepository::new(&db.pool);
    let order = orders.place_order(user.id, &new_order(&address)).await.unwrap();
    assert_eq!(db.product_stock(&product).await.unwrap(), 6);

    let shipped = orders
        .update_status(
            order.id,
            &StatusUpdate {
                status: OrderStatus::Shipped,
                tracking_number: Some("1Z999AA10123456784"),
                carrier: Some("UPS"),
                note: None,
            },
        )
        .await
        .unwrap();
    assert!(shipped.shipped_at.is_some());
    assert_eq!(shipped.carrier.as_deref(), Some("UPS"));

    let cancelled = orders
        .update_status(
            order.id,
            &StatusUpdate {
                status: OrderStatus::Cancelled,
                tracking_number: None,
                carrier: None,
                note: Some("Lost in transit"),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.tracking_number.as_deref(), Some("1Z999AA10123456784"));
    assert_eq!(db.product_stock(&product).await.unwrap(), 10);

    let revived = orders
        .update_status(
            order.id,
            &StatusUpdate {
                status: OrderStatus::Processing,
                tracking_number: None,
                carrier: None,
                note: None,
            },
        )
        .await;
    assert!(matches!(revived, Err(RepositoryError::Conflict(_))));

    let tracking = orders.tracking(user.id, order.id).await.unwrap().unwrap();
    assert_eq!(tracking.history.len(), 3);
    assert!(tracking.estimated_delivery.is_some());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_failed_then_cancelled_restocks_exactly_once() {
    let db = TestDb::connect().await.unwrap();
    let (user, address) = shopper(&db).await;
    let product = db.product(dec!(12.00), 10).await.unwrap();

    let carts = CartRepository::new(&db.pool);
    let cart = carts.get_or_create(user.id).await.unwrap();
    carts
        .add_item(cart.id, product.id, None, 4, product.price)
        .await
        .unwrap();

    let orders = OrderRepository::new(&db.pool);
    let order = orders.place_order(user.id, &new_order(&address)).await.unwrap();
    assert_eq!(db.product_stock(&product).await.unwrap(), 6);

    let status = |status| StatusUpdate {
        status,
        tracking_number: None,
        carrier: None,
        note: None,
    };

    orders
        .update_status(order.id, &status(OrderStatus::Failed))
        .await
        .unwrap();
    assert_eq!(db.product_stock(&product).await.unwrap(), 10);

    let cancelled = orders
        .update_status(order.id, &status(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(db.product_stock(&product).await.unwrap(), 10);
}
