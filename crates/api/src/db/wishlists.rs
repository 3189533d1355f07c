//! Wishlist repository.
//!
//! A product appears at most once in a user's wishlist.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lumina_core::{ProductId, UserId, WishlistItemId};

use super::catalog::{JOINED_PRODUCT_COLUMNS, ProductRow};
use super::{RepositoryError, map_constraint};
use crate::models::{Product, WishlistItem};

#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    wishlist_id: i64,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl From<WishlistRow> for WishlistItem {
    fn from(row: WishlistRow) -> Self {
        let product = Product::from(row.product);
        Self {
            id: WishlistItemId::new(row.wishlist_id),
            product_id: product.id,
            product,
            added_at: row.added_at,
        }
    }
}

/// Repository for saved products.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's wishlist, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(&format!(
            r"
            SELECT w.id AS wishlist_id, w.created_at AS added_at, {JOINED_PRODUCT_COLUMNS}
            FROM wishlists w
            JOIN products p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC, w.id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Save a product to the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product is already saved
    /// or no longer exists.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<WishlistItem, RepositoryError> {
        let row = sqlx::query_as::<_, WishlistRow>(&format!(
            r"
            WITH w AS (
                INSERT INTO wishlists (user_id, product_id)
                VALUES ($1, $2)
                RETURNING id, product_id, created_at
            )
            SELECT w.id AS wishlist_id, w.created_at AS added_at, {JOINED_PRODUCT_COLUMNS}
            FROM w
            JOIN products p ON p.id = w.product_id
            "
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "Product already in wishlist"))?;

        Ok(row.into())
    }

    /// Remove a product from the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product wasn't saved.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Whether the product is in the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM wishlists WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
