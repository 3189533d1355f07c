//! Cart repository.
//!
//! Each user has at most one cart row, created on first access. Lines are
//! unique per product/variant pair; adding an existing pair increments it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use lumina_core::pricing::{line_total, round_cents};
use lumina_core::{CartId, CartItemId, CartLine, ProductId, UserId, VariantId};

use super::RepositoryError;
use crate::models::{CartItem, CartView};

/// Most units of one product/variant a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Cart lines joined with the catalog state checkout validation needs.
pub(crate) const CART_LINES_SQL: &str = r"
    SELECT ci.id AS item_id, ci.product_id, ci.variant_id,
           p.name AS product_name, v.name AS variant_name,
           COALESCE(v.sku, p.sku) AS sku,
           ci.quantity, ci.unit_price,
           p.is_active AS product_active, p.stock_quantity AS product_stock,
           v.is_active AS variant_active, v.stock_quantity AS variant_stock
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
    LEFT JOIN product_variants v ON v.id = ci.variant_id
    WHERE ci.cart_id = $1
    ORDER BY ci.id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CartLineRow {
    item_id: i64,
    product_id: i64,
    variant_id: Option<i64>,
    product_name: String,
    variant_name: Option<String>,
    sku: String,
    quantity: i32,
    unit_price: Decimal,
    product_active: bool,
    product_stock: i32,
    variant_active: Option<bool>,
    variant_stock: Option<i32>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            item_id: CartItemId::new(row.item_id),
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            quantity: row.quantity,
            unit_price: round_cents(row.unit_price),
            product_active: row.product_active,
            product_stock: row.product_stock,
            variant_active: row.variant_active,
            variant_stock: row.variant_stock,
        }
    }
}

impl From<CartLineRow> for CartItem {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: CartItemId::new(row.item_id),
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            quantity: row.quantity,
            total_price: line_total(row.unit_price, row.quantity),
            unit_price: round_cents(row.unit_price),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for carts and cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: UserId) -> Result<CartView, RepositoryError> {
        let cart = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO carts (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at, updated_at
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        self.load(cart).await
    }

    /// Get the user's cart if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn find(&self, user_id: UserId) -> Result<Option<CartView>, RepositoryError> {
        let cart = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        match cart {
            Some(cart) => Ok(Some(self.load(cart).await?)),
            None => Ok(None),
        }
    }

    /// Cart lines with current catalog state, for availability checks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let cart_id = sqlx::query_scalar::<_, i64>("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;

        let Some(cart_id) = cart_id else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, CartLineRow>(CART_LINES_SQL)
            .bind(cart_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add `quantity` units of a product/variant at `unit_price`.
    ///
    /// An existing line for the same pair keeps its price and has its
    /// quantity increased, capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartItemId, RepositoryError> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO cart_items (cart_id, product_id, variant_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (cart_id, product_id, (COALESCE(variant_id, 0)))
            DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $6),
                          updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(MAX_LINE_QUANTITY)
        .fetch_one(self.pool)
        .await?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;

        Ok(CartItemId::new(id))
    }

    /// Set the quantity of a line in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in the user's cart.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items ci
            SET quantity = $3, updated_at = NOW()
            FROM carts c
            WHERE ci.id = $2 AND ci.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_items ci
            USING carts c
            WHERE ci.id = $2 AND ci.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .bind(item_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove every line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_items ci
            USING carts c
            WHERE ci.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn load(&self, cart: CartRow) -> Result<CartView, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(CART_LINES_SQL)
            .bind(cart.id)
            .fetch_all(self.pool)
            .await?;

        Ok(CartView {
            id: CartId::new(cart.id),
            user_id: UserId::new(cart.user_id),
            items: rows.into_iter().map(Into::into).collect(),
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        })
    }
}
