//! Wishlist and browsing history types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumina_core::{ProductId, WishlistItemId};

use super::Product;

/// A saved product.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    pub product: Product,
    pub added_at: DateTime<Utc>,
}

/// A product the user opened, with the time of the latest view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub viewed_at: DateTime<Utc>,
}
