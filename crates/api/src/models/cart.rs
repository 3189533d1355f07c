//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use lumina_core::pricing::round_cents;
use lumina_core::{CartId, CartItemId, ProductId, UserId, VariantId};

/// A cart line joined with the names needed to display it.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// A user's cart and its lines.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    /// Number of distinct lines.
    #[must_use]
    pub fn items_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        round_cents(self.items.iter().map(|item| item.total_price).sum())
    }

    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub items_count: usize,
    pub total_amount: Decimal,
    pub total_quantity: i64,
    pub items: Vec<CartItem>,
}

impl From<CartView> for CartSummary {
    fn from(cart: CartView) -> Self {
        Self {
            items_count: cart.items_count(),
            total_amount: cart.total_amount(),
            total_quantity: cart.total_quantity(),
            items: cart.items,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cart(items: Vec<CartItem>) -> CartView {
        CartView {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: i64, total_price: Decimal) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            variant_id: None,
            product_name: "Rose Toner".to_owned(),
            variant_name: None,
            sku: format!("RT-{id}"),
            quantity: 1,
            unit_price: total_price,
            total_price,
        }
    }

    #[test]
    fn test_empty_cart_total_has_cents() {
        let summary = CartSummary::from(cart(Vec::new()));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_amount"], "0.00");
        assert_eq!(json["total_quantity"], 0);
    }

    #[test]
    fn test_cart_total_sums_lines() {
        let view = cart(vec![item(1, dec!(12.5)), item(2, dec!(7.25))]);
        assert_eq!(view.total_amount().to_string(), "19.75");
        assert_eq!(cart(vec![item(1, dec!(20))]).total_amount().to_string(), "20.00");
    }
}
