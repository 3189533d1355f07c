//! Order repository, including the cart-to-order checkout transaction.
//!
//! # Checkout
//!
//! [`OrderRepository::place_order`] runs in one transaction:
//!
//! 1. Check both addresses belong to the caller.
//! 2. Lock the cart row, then the product and variant rows it references.
//! 3. Read the cart lines and plan the order with [`lumina_core::plan_checkout`].
//! 4. Number the order under an advisory lock.
//! 5. Insert the order and its items, decrement stock with a guarded update,
//!    empty the cart, record a tracking event, commit.
//!
//! Any early return drops the transaction, which rolls it back.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tracing::instrument;

use lumina_core::{
    AddressId, CartIssue, CartIssueKind, CartLine, CheckoutError, OrderId, OrderItemId,
    OrderNumber, OrderStatus, PaymentMethod, PaymentStatus, PlannedItem, ProductId,
    StockAdjustment, StockTarget, UserId, VariantId, plan_checkout, pricing,
    restock_adjustments,
};

use super::RepositoryError;
use super::carts::{CART_LINES_SQL, CartLineRow};
use crate::models::{Order, OrderDetail, OrderItem, TrackingEvent, TrackingInfo};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, subtotal, tax_amount, \
     shipping_amount, total_amount, currency, billing_address_id, shipping_address_id, \
     payment_method, payment_status, notes, tracking_number, carrier, shipped_at, \
     delivered_at, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, product_id, variant_id, product_name, variant_name, sku, \
     quantity, unit_price, total_price";

/// Advisory lock key serializing order numbering.
const ORDER_NUMBER_LOCK: i64 = 0x4f52_444e;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    status: OrderStatus,
    subtotal: Decimal,
    tax_amount: Decimal,
    shipping_amount: Decimal,
    total_amount: Decimal,
    currency: String,
    billing_address_id: i64,
    shipping_address_id: i64,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    notes: Option<String>,
    tracking_number: Option<String>,
    carrier: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: UserId::new(row.user_id),
            status: row.status,
            subtotal: pricing::round_cents(row.subtotal),
            tax_amount: pricing::round_cents(row.tax_amount),
            shipping_amount: pricing::round_cents(row.shipping_amount),
            total_amount: pricing::round_cents(row.total_amount),
            currency: row.currency,
            billing_address_id: AddressId::new(row.billing_address_id),
            shipping_address_id: AddressId::new(row.shipping_address_id),
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            notes: row.notes,
            tracking_number: row.tracking_number,
            carrier: row.carrier,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    product_id: i64,
    variant_id: Option<i64>,
    product_name: String,
    variant_name: Option<String>,
    sku: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            quantity: row.quantity,
            unit_price: pricing::round_cents(row.unit_price),
            total_price: pricing::round_cents(row.total_price),
        }
    }
}

impl From<OrderItemRow> for PlannedItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            quantity: row.quantity,
            unit_price: pricing::round_cents(row.unit_price),
            total_price: pricing::round_cents(row.total_price),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrackingRow {
    status: OrderStatus,
    description: String,
    tracked_at: DateTime<Utc>,
}

impl From<TrackingRow> for TrackingEvent {
    fn from(row: TrackingRow) -> Self {
        Self {
            status: row.status,
            description: row.description,
            tracked_at: row.tracked_at,
        }
    }
}

// =============================================================================
// Input and Error Types
// =============================================================================

/// Checkout request after validation.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub billing_address_id: AddressId,
    pub shipping_address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub notes: Option<&'a str>,
}

/// Admin status change.
#[derive(Debug, Clone)]
pub struct StatusUpdate<'a> {
    pub status: OrderStatus,
    pub tracking_number: Option<&'a str>,
    pub carrier: Option<&'a str>,
    pub note: Option<&'a str>,
}

/// Filters for the admin order listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

/// Ways placing an order can fail.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// A billing or shipping address is missing or belongs to someone else.
    #[error("address not found")]
    AddressNotFound,

    /// The cart is empty or holds unavailable items.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::AddressNotFound` if an address isn't the user's.
    /// Returns `PlaceOrderError::Checkout` if the cart is empty or any line is
    /// unavailable, including a stock guard failing during the decrement.
    /// Returns `PlaceOrderError::Repository` for database failures.
    /// In every error case nothing is written.
    #[instrument(skip(self, new_order), fields(payment_method = ?new_order.payment_method))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        new_order: &NewOrder<'_>,
    ) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        for address_id in [new_order.billing_address_id, new_order.shipping_address_id] {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM addresses WHERE id = $1 AND user_id = $2)",
            )
            .bind(address_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

            if !owned {
                return Err(PlaceOrderError::AddressNotFound);
            }
        }

        let cart_id =
            sqlx::query_scalar::<_, i64>("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(CheckoutError::EmptyCart)?;

        let lines = lock_cart_lines(&mut tx, cart_id).await?;
        let plan = plan_checkout(&lines)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ORDER_NUMBER_LOCK)
            .execute(&mut *tx)
            .await?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
            .fetch_one(&mut *tx)
            .await?;
        let order_number = OrderNumber::sequential(Utc::now().year(), existing);

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders
                (order_number, user_id, status, subtotal, tax_amount, shipping_amount,
                 total_amount, currency, billing_address_id, shipping_address_id,
                 payment_method, payment_status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order_number.as_str())
        .bind(user_id)
        .bind(OrderStatus::Pending)
        .bind(plan.totals.subtotal)
        .bind(plan.totals.tax_amount)
        .bind(plan.totals.shipping_amount)
        .bind(plan.totals.total_amount)
        .bind(pricing::CURRENCY)
        .bind(new_order.billing_address_id)
        .bind(new_order.shipping_address_id)
        .bind(new_order.payment_method)
        .bind(PaymentStatus::Pending)
        .bind(new_order.notes)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = QueryBuilder::<Postgres>::new(
            "INSERT INTO order_items (order_id, product_id, variant_id, product_name, \
             variant_name, sku, quantity, unit_price, total_price) ",
        );
        items.push_values(&plan.items, |mut row, item| {
            row.push_bind(order.id)
                .push_bind(item.product_id)
                .push_bind(item.variant_id)
                .push_bind(&item.product_name)
                .push_bind(&item.variant_name)
                .push_bind(&item.sku)
                .push_bind(item.quantity)
                .push_bind(item.unit_price)
                .push_bind(item.total_price);
        });
        items.build().execute(&mut *tx).await?;

        for (adjustment, line) in plan.adjustments.iter().zip(&lines) {
            if !decrement_stock(&mut tx, adjustment).await? {
                tracing::warn!(
                    item_id = %line.item_id,
                    "stock changed during checkout, rolling back"
                );
                return Err(CheckoutError::Unavailable(vec![CartIssue {
                    item_id: line.item_id,
                    kind: CartIssueKind::InsufficientStock,
                    message: format!("{} is no longer in stock", line.product_name),
                }])
                .into());
            }
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        record_tracking(&mut tx, order.id, OrderStatus::Pending, "Order placed").await?;

        tx.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            "order placed"
        );

        Ok(order.into())
    }

    /// Cancel a pending or processing order and restore its stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order isn't the user's or
    /// can no longer be cancelled.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|order| order.status.is_cancellable())
        .ok_or(RepositoryError::NotFound)?;

        restock(&mut tx, order.id).await?;

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2, cancelled_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.id)
        .bind(OrderStatus::Cancelled)
        .fetch_one(&mut *tx)
        .await?;

        record_tracking(
            &mut tx,
            order.id,
            OrderStatus::Cancelled,
            "Order cancelled by customer",
        )
        .await?;

        tx.commit().await?;

        Ok(order.into())
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// An order of the user's with its items and addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = self.find(order_id, Some(user_id)).await? else {
            return Ok(None);
        };
        self.detail(order).await.map(Some)
    }

    /// Tracking summary and history for one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn tracking(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<TrackingInfo>, RepositoryError> {
        let Some(order) = self.find(order_id, Some(user_id)).await? else {
            return Ok(None);
        };

        let history = sqlx::query_as::<_, TrackingRow>(
            r"
            SELECT status, description, tracked_at
            FROM order_tracking
            WHERE order_id = $1
            ORDER BY tracked_at ASC, id ASC
            ",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(TrackingInfo::new(
            order,
            history.into_iter().map(Into::into).collect(),
        )))
    }

    /// All orders, newest first, for the admin console.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        filter: OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR user_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Change an order's status as staff.
    ///
    /// Shipping stamps `shipped_at` and delivery stamps `delivered_at`. Leaving
    /// a stock-holding status (cancelled, refunded or failed) restores stock
    /// exactly like a customer cancellation, once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` when reviving an order whose stock
    /// was already released.
    #[instrument(skip(self, update), fields(status = %update.status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        update: &StatusUpdate<'_>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if !current.status.holds_stock() && update.status.holds_stock() {
            return Err(RepositoryError::Conflict(format!(
                "order is {} and cannot become {}",
                current.status, update.status
            )));
        }

        if current.status.releases_stock_to(update.status) {
            restock(&mut tx, current.id).await?;
        }

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2,
                tracking_number = COALESCE($3, tracking_number),
                carrier = COALESCE($4, carrier),
                shipped_at = CASE WHEN $2::order_status = 'shipped' AND shipped_at IS NULL
                                  THEN NOW() ELSE shipped_at END,
                delivered_at = CASE WHEN $2::order_status = 'delivered' AND delivered_at IS NULL
                                    THEN NOW() ELSE delivered_at END,
                cancelled_at = CASE WHEN $2::order_status = 'cancelled' AND cancelled_at IS NULL
                                    THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(update.status)
        .bind(update.tracking_number)
        .bind(update.carrier)
        .fetch_one(&mut *tx)
        .await?;

        let description = update
            .note
            .map_or_else(|| format!("Status changed to {}", update.status), str::to_owned);
        record_tracking(&mut tx, order.id, update.status, &description).await?;

        tx.commit().await?;

        Ok(order.into())
    }

    /// Items of an order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(
        &self,
        order_id: OrderId,
        user_id: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)
            "
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let addresses = super::AddressRepository::new(self.pool);
        let items = self.items(order.id).await?;
        let billing_address = addresses.get(order.billing_address_id).await?;
        let shipping_address = addresses.get(order.shipping_address_id).await?;

        Ok(OrderDetail {
            order,
            items,
            billing_address,
            shipping_address,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Lock the catalog rows a cart references, then read its lines.
///
/// Rows are locked in ID order so concurrent checkouts sharing products
/// cannot deadlock.
async fn lock_cart_lines(
    conn: &mut PgConnection,
    cart_id: i64,
) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query(
        r"
        SELECT id FROM products
        WHERE id IN (SELECT product_id FROM cart_items WHERE cart_id = $1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(cart_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        SELECT id FROM product_variants
        WHERE id IN (SELECT variant_id FROM cart_items WHERE cart_id = $1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(cart_id)
    .execute(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, CartLineRow>(CART_LINES_SQL)
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Subtract stock unless it would go negative. Returns whether a row changed.
async fn decrement_stock(
    conn: &mut PgConnection,
    adjustment: &StockAdjustment,
) -> Result<bool, sqlx::Error> {
    let (sql, id) = match adjustment.target {
        StockTarget::Product(id) => (
            r"
            UPDATE products
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity >= $2
            ",
            id.as_i64(),
        ),
        StockTarget::Variant(id) => (
            r"
            UPDATE product_variants
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity >= $2
            ",
            id.as_i64(),
        ),
    };

    let result = sqlx::query(sql)
        .bind(id)
        .bind(adjustment.quantity)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

async fn increment_stock(
    conn: &mut PgConnection,
    adjustment: &StockAdjustment,
) -> Result<(), sqlx::Error> {
    let (sql, id) = match adjustment.target {
        StockTarget::Product(id) => (
            "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1",
            id.as_i64(),
        ),
        StockTarget::Variant(id) => (
            "UPDATE product_variants SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1",
            id.as_i64(),
        ),
    };

    sqlx::query(sql)
        .bind(id)
        .bind(adjustment.quantity)
        .execute(conn)
        .await?;

    Ok(())
}

/// Put back exactly the quantities an order took.
async fn restock(conn: &mut PgConnection, order_id: i64) -> Result<(), sqlx::Error> {
    let items: Vec<PlannedItem> = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    for adjustment in restock_adjustments(&items) {
        increment_stock(&mut *conn, &adjustment).await?;
    }

    Ok(())
}

async fn record_tracking(
    conn: &mut PgConnection,
    order_id: i64,
    status: OrderStatus,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_tracking (order_id, status, description) VALUES ($1, $2, $3)",
    )
    .bind(order_id)
    .bind(status)
    .bind(description)
    .execute(conn)
    .await?;

    Ok(())
}
