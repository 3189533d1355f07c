//! Database operations for the Lumina `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `api_tokens` - Accounts and hashed bearer tokens
//! - `categories`, `products`, `product_variants` - Catalog
//! - `carts`, `cart_items` - One cart per user
//! - `addresses` - Billing and shipping addresses
//! - `orders`, `order_items`, `order_tracking` - Checkout snapshots and history
//! - `community_posts`, `post_comments`, `post_likes`
//! - `support_tickets`, `support_messages`
//! - `wishlists`, `product_reviews`, `recently_viewed`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p lumina-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! private `*Row` types, so the crate builds without a live database.

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod community;
pub mod orders;
pub mod reviews;
pub mod support;
pub mod tokens;
pub mod users;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use catalog::CatalogRepository;
pub use community::CommunityRepository;
pub use orders::OrderRepository;
pub use reviews::ReviewRepository;
pub use support::SupportRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;
pub use wishlists::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email, referenced address).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map unique and foreign-key violations to `Conflict`.
pub(crate) fn map_constraint(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Substring pattern for `ILIKE ... ESCAPE '\'` matching `term` literally.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2.min(max_connections))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("serum"), "%serum%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("eye_cream"), "%eye\\_cream%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
        assert_eq!(contains_pattern(""), "%%");
    }
}
