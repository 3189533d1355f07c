//! Product review repository.
//!
//! `products.rating` and `products.review_count` are recomputed in the same
//! transaction that writes a review.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lumina_core::{OrderStatus, ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::{Review, ReviewAuthor};

const REVIEW_COLUMNS: &str = "r.id, r.product_id, r.user_id, u.name AS author_name, r.rating, \
     r.title, r.comment, r.is_verified_purchase, r.helpful_count, r.created_at, r.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    product_id: i64,
    user_id: i64,
    author_name: String,
    rating: i16,
    title: Option<String>,
    comment: Option<String>,
    is_verified_purchase: bool,
    helpful_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user: ReviewAuthor {
                id: UserId::new(row.user_id),
                name: row.author_name,
            },
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_verified_purchase: row.is_verified_purchase,
            helpful_count: row.helpful_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields of a new review.
#[derive(Debug, Clone)]
pub struct NewReview<'a> {
    pub rating: i16,
    pub title: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first, optionally only those with
    /// exactly `rating` stars.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        rating: Option<i16>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            SELECT {REVIEW_COLUMNS}
            FROM product_reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.product_id = $1
              AND ($2::smallint IS NULL OR r.rating = $2)
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(product_id)
        .bind(rating)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Write a review and refresh the product's rating and review count.
    ///
    /// The review counts as a verified purchase when the user has a
    /// delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    #[instrument(skip(self, review), fields(rating = review.rating))]
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        review: &NewReview<'_>,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            WITH r AS (
                INSERT INTO product_reviews
                    (product_id, user_id, rating, title, comment, is_verified_purchase)
                VALUES ($1, $2, $3, $4, $5, EXISTS (
                    SELECT 1 FROM order_items oi
                    JOIN orders o ON o.id = oi.order_id
                    WHERE o.user_id = $2 AND oi.product_id = $1 AND o.status = $6
                ))
                RETURNING *
            )
            SELECT {REVIEW_COLUMNS}
            FROM r
            JOIN users u ON u.id = r.user_id
            "
        ))
        .bind(product_id)
        .bind(user_id)
        .bind(review.rating)
        .bind(review.title)
        .bind(review.comment)
        .bind(OrderStatus::Delivered)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE products
            SET rating = COALESCE(
                    (SELECT ROUND(AVG(rating)::numeric, 2) FROM product_reviews WHERE product_id = $1),
                    0),
                review_count = (SELECT COUNT(*) FROM product_reviews WHERE product_id = $1),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }
}
