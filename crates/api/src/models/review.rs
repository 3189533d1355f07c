//! Product review types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumina_core::{ProductId, ReviewId, UserId};

/// Public identity of a reviewer.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewAuthor {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user: ReviewAuthor,
    /// 1 to 5 stars.
    pub rating: i16,
    pub title: Option<String>,
    pub comment: Option<String>,
    /// The reviewer has a delivered order containing the product.
    pub is_verified_purchase: bool,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
