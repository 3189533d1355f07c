//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST /api/auth/register               - Create account, returns token (rate limited)
//! POST /api/auth/login                  - Returns token (rate limited)
//! POST /api/auth/logout                 - Revoke current token
//! GET  /api/auth/profile                - Caller with addresses and recent orders
//! PUT  /api/auth/profile                - Update profile
//! PUT  /api/auth/change-password        - Change password, rotates tokens
//!
//! # Catalog (public)
//! GET  /api/products                    - Filtered, sorted, paginated listing
//! GET  /api/products/featured           - Featured products
//! GET  /api/products/search?q=          - Name/description search
//! GET  /api/products/{id}               - Product with category and variants, records the view
//! GET  /api/products/{id}/variants      - Active variants
//! GET  /api/products/{id}/similar       - Same category, best rated
//! GET  /api/products/{id}/reviews       - Reviews, newest first (?rating=)
//! GET  /api/categories                  - Active categories
//! GET  /api/categories/{id}/products    - Products in a category
//!
//! # Cart (auth)
//! GET    /api/cart                      - Cart with totals
//! POST   /api/cart/items                - Add item
//! PUT    /api/cart/items/{itemId}       - Set quantity
//! DELETE /api/cart/items/{itemId}       - Remove item
//! DELETE /api/cart/clear                - Remove all items
//! GET    /api/cart/summary              - Counts and totals
//! GET    /api/cart/validate             - Availability check
//!
//! # Orders (auth)
//! GET  /api/orders                      - Caller's orders
//! POST /api/orders                      - Checkout the cart
//! GET  /api/orders/{orderId}            - Order with items and addresses
//! POST /api/orders/{orderId}/cancel     - Cancel and restock
//! GET  /api/orders/{orderId}/tracking   - Shipping status and history
//!
//! # User (auth)
//! GET  /api/user/profile                - Alias of auth profile
//! PUT  /api/user/profile                - Alias of auth profile update
//! GET  /api/user/stats                  - Orders, spend, reviews, wishlist size
//! GET  /api/user/addresses              - Address book
//! POST /api/user/addresses              - Add address
//! PUT  /api/user/addresses/{id}         - Update address
//! DELETE /api/user/addresses/{id}       - Delete address
//! GET  /api/user/wishlist               - Saved products
//! POST /api/user/wishlist               - Save a product
//! DELETE /api/user/wishlist/{productId} - Remove a saved product
//! GET  /api/user/recently-viewed        - Last products opened
//!
//! # Community
//! GET  /api/community/posts             - Published posts (public)
//! GET  /api/community/posts/{id}        - Post with latest comments (public)
//! POST /api/community/posts             - Create post
//! PUT  /api/community/posts/{id}        - Update own post
//! DELETE /api/community/posts/{id}      - Delete own post
//! POST /api/community/posts/{id}/like   - Toggle like
//! POST /api/community/posts/{id}/comments - Comment
//! GET  /api/community/my-posts          - Caller's posts
//!
//! # Support (auth)
//! GET  /api/support/tickets             - Caller's tickets
//! POST /api/support/tickets             - Open a ticket
//! GET  /api/support/tickets/{id}        - Ticket with messages
//! POST /api/support/tickets/{id}/messages - Reply
//!
//! # Admin (admin or super_admin)
//! GET  /api/admin/orders                - All orders
//! PUT  /api/admin/orders/{id}/status    - Move order through its lifecycle
//! GET  /api/admin/reports/low-stock     - Low stock report
//! GET  /api/admin/users                 - Users
//! POST /api/admin/users                 - Create staff account
//! PUT  /api/admin/users/{id}/role       - Change role (super_admin)
//! GET  /api/admin/support/tickets       - All tickets
//! PUT  /api/admin/support/tickets/{id}  - Status/priority
//! POST /api/admin/support/tickets/{id}/messages - Staff reply
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod community;
pub mod orders;
pub mod products;
pub mod support;
pub mod user;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use serde::Deserialize;

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Largest page a client may request.
pub const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    /// Resolve to `(limit, offset)`, clamping to sane bounds.
    #[must_use]
    pub fn limit_offset(self, default_per_page: i64) -> (i64, i64) {
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    // Only the credential endpoints are throttled.
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile).put(auth::update_profile))
        .route("/change-password", put(auth::change_password))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/featured", get(products::featured))
        .route("/search", get(products::search))
        .route("/{id}", get(products::show))
        .route("/{id}/variants", get(products::variants))
        .route("/{id}/similar", get(products::similar))
        .route("/{id}/reviews", get(products::reviews))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index))
        .route("/{id}/products", get(categories::products))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{item_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route("/clear", delete(cart::clear))
        .route("/summary", get(cart::summary))
        .route("/validate", get(cart::validate))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::store))
        .route("/{order_id}", get(orders::show))
        .route("/{order_id}/cancel", post(orders::cancel))
        .route("/{order_id}/tracking", get(orders::tracking))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(auth::profile).put(auth::update_profile))
        .route("/stats", get(user::stats))
        .route("/addresses", get(user::addresses).post(user::create_address))
        .route(
            "/addresses/{id}",
            put(user::update_address).delete(user::delete_address),
        )
        .route("/wishlist", get(user::wishlist).post(user::add_to_wishlist))
        .route("/wishlist/{product_id}", delete(user::remove_from_wishlist))
        .route("/recently-viewed", get(user::recently_viewed))
}

/// Create the community routes router.
pub fn community_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(community::index).post(community::store))
        .route(
            "/posts/{id}",
            get(community::show)
                .put(community::update)
                .delete(community::destroy),
        )
        .route("/posts/{id}/like", post(community::like))
        .route("/posts/{id}/comments", post(community::comment))
        .route("/my-posts", get(community::my_posts))
}

/// Create the support routes router.
pub fn support_routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(support::index).post(support::store))
        .route("/tickets/{id}", get(support::show))
        .route("/tickets/{id}/messages", post(support::add_message))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::orders))
        .route("/orders/{id}/status", put(admin::update_order_status))
        .route("/reports/low-stock", get(admin::low_stock))
        .route("/users", get(admin::users).post(admin::create_user))
        .route("/users/{id}/role", put(admin::update_user_role))
        .route("/support/tickets", get(admin::tickets))
        .route("/support/tickets/{id}", put(admin::update_ticket))
        .route("/support/tickets/{id}/messages", post(admin::reply_ticket))
}

/// Create all routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/user", user_routes())
        .nest("/community", community_routes())
        .nest("/support", support_routes())
        .nest("/admin", admin_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(Pagination::default().limit_offset(20), (20, 0));
    }

    #[test]
    fn test_pagination_offsets_by_page() {
        let pagination = Pagination {
            page: Some(3),
            per_page: Some(15),
        };
        assert_eq!(pagination.limit_offset(20), (15, 30));
    }

    #[test]
    fn test_pagination_clamps() {
        let pagination = Pagination {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(pagination.limit_offset(20), (MAX_PER_PAGE, 0));

        let pagination = Pagination {
            page: Some(-4),
            per_page: Some(0),
        };
        assert_eq!(pagination.limit_offset(20), (1, 0));
    }
}
