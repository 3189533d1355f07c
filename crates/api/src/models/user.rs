//! User domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use lumina_core::{Email, SkinType, UserId, UserRole};

/// A customer or staff account.
///
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub skin_type: Option<SkinType>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account statistics shown on the profile page.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_orders: i64,
    /// Sum of `total_amount` over paid orders.
    pub total_spent: Decimal,
    pub total_reviews: i64,
    pub wishlist_count: i64,
    pub member_since: DateTime<Utc>,
}
