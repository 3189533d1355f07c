//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use lumina_core::pricing::effective_price;
use lumina_core::{CategoryId, ProductId, VariantId};

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    /// Active products with stock, filled in by the listing query.
    pub products_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price charged when the product is added to a cart.
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        effective_price(self.price, self.sale_price)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub is_active: bool,
}

impl ProductVariant {
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        effective_price(self.price, self.sale_price)
    }
}

/// A product with its category and active variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub variants: Vec<ProductVariant>,
}

/// One row of the low-stock report. `variant_*` is set for variant stock.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockEntry {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant_id: Option<VariantId>,
    pub variant_name: Option<String>,
    pub sku: String,
    pub stock_quantity: i32,
}
