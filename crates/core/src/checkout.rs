//! Cart validation and order planning.
//!
//! Everything here works on a snapshot of the cart that the caller has
//! already loaded (and, inside a transaction, locked). The planner decides
//! whether the cart can become an order and, if so, which order lines to
//! write and which stock rows to decrement. It never touches the database.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::{OrderTotals, line_total};
use crate::types::{CartItemId, ProductId, VariantId};

/// One cart line joined with the product and (optional) variant it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub product_active: bool,
    pub product_stock: i32,
    pub variant_active: Option<bool>,
    pub variant_stock: Option<i32>,
}

impl CartLine {
    /// The stock row this line draws from.
    #[must_use]
    pub const fn stock_target(&self) -> StockTarget {
        match self.variant_id {
            Some(id) => StockTarget::Variant(id),
            None => StockTarget::Product(self.product_id),
        }
    }

    /// Units available for this line. An inactive variant has none.
    #[must_use]
    pub fn available_stock(&self) -> i32 {
        if self.variant_id.is_some() {
            match (self.variant_active, self.variant_stock) {
                (Some(true), Some(stock)) => stock,
                _ => 0,
            }
        } else {
            self.product_stock
        }
    }

    fn issue(&self) -> Option<CartIssue> {
        if !self.product_active {
            return Some(CartIssue {
                item_id: self.item_id,
                kind: CartIssueKind::ProductInactive,
                message: format!("{} is no longer available", self.product_name),
            });
        }

        let available = self.available_stock();
        if available < self.quantity {
            return Some(CartIssue {
                item_id: self.item_id,
                kind: CartIssueKind::InsufficientStock,
                message: format!(
                    "Only {} units available for {}",
                    available.max(0),
                    self.display_name()
                ),
            });
        }

        None
    }

    fn display_name(&self) -> String {
        match &self.variant_name {
            Some(variant) => format!("{} ({variant})", self.product_name),
            None => self.product_name.clone(),
        }
    }
}

/// Why a cart line cannot be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartIssueKind {
    ProductInactive,
    InsufficientStock,
}

/// A problem with one cart line, as reported to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartIssue {
    pub item_id: CartItemId,
    #[serde(rename = "type")]
    pub kind: CartIssueKind,
    pub message: String,
}

/// Stock row affected by an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockTarget {
    Product(ProductId),
    Variant(VariantId),
}

/// A stock change of `quantity` units on `target`.
///
/// `quantity` is always positive; whether it is added or removed is up to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub target: StockTarget,
    pub quantity: i32,
}

/// An order line to be written, snapshotting the catalog at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl PlannedItem {
    #[must_use]
    pub const fn stock_target(&self) -> StockTarget {
        match self.variant_id {
            Some(id) => StockTarget::Variant(id),
            None => StockTarget::Product(self.product_id),
        }
    }
}

/// Everything needed to turn a cart into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub items: Vec<PlannedItem>,
    /// Quantities to subtract, one entry per line in cart order.
    pub adjustments: Vec<StockAdjustment>,
    pub totals: OrderTotals,
}

/// Reasons a cart cannot be checked out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Some items in your cart are no longer available")]
    Unavailable(Vec<CartIssue>),
}

/// Report every line that cannot currently be ordered.
#[must_use]
pub fn validate_lines(lines: &[CartLine]) -> Vec<CartIssue> {
    lines.iter().filter_map(CartLine::issue).collect()
}

/// Plan an order from a cart snapshot.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] when there are no lines, and
/// [`CheckoutError::Unavailable`] listing every problem line otherwise.
pub fn plan_checkout(lines: &[CartLine]) -> Result<CheckoutPlan, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let issues = validate_lines(lines);
    if !issues.is_empty() {
        return Err(CheckoutError::Unavailable(issues));
    }

    let items: Vec<PlannedItem> = lines
        .iter()
        .map(|line| PlannedItem {
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            variant_name: line.variant_name.clone(),
            sku: line.sku.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_price: line_total(line.unit_price, line.quantity),
        })
        .collect();

    let adjustments = lines
        .iter()
        .map(|line| StockAdjustment {
            target: line.stock_target(),
            quantity: line.quantity,
        })
        .collect();

    let totals =
        OrderTotals::from_lines(lines.iter().map(|line| (line.unit_price, line.quantity)));

    Ok(CheckoutPlan {
        items,
        adjustments,
        totals,
    })
}

/// Stock to put back when an order is cancelled: exactly what each line took.
pub fn restock_adjustments<'a, I>(items: I) -> Vec<StockAdjustment>
where
    I: IntoIterator<Item = &'a PlannedItem>,
{
    items
        .into_iter()
        .map(|item| StockAdjustment {
            target: item.stock_target(),
            quantity: item.quantity,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;

    use super::*;

    fn product_line(item: i64, product: i64, quantity: i32, price: Decimal, stock: i32) -> CartLine {
        CartLine {
            item_id: CartItemId::new(item),
            product_id: ProductId::new(product),
            variant_id: None,
            product_name: format!("Product {product}"),
            variant_name: None,
            sku: format!("SKU-{product}"),
            quantity,
            unit_price: price,
            product_active: true,
            product_stock: stock,
            variant_active: None,
            variant_stock: None,
        }
    }

    fn variant_line(item: i64, product: i64, variant: i64, quantity: i32, stock: i32) -> CartLine {
        CartLine {
            variant_id: Some(VariantId::new(variant)),
            variant_name: Some("50ml".to_owned()),
            variant_active: Some(true),
            variant_stock: Some(stock),
            product_stock: 0,
            ..product_line(item, product, quantity, dec!(24.00), 0)
        }
    }

    fn apply(stock: &mut HashMap<StockTarget, i32>, adjustments: &[StockAdjustment], sign: i32) {
        for adj in adjustments {
            *stock.entry(adj.target).or_default() += sign * adj.quantity;
        }
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        assert_eq!(plan_checkout(&[]), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn test_plan_decrements_ordered_quantities() {
        let lines = [
            product_line(1, 10, 2, dec!(12.50), 5),
            variant_line(2, 11, 100, 3, 3),
        ];
        let plan = plan_checkout(&lines).unwrap();

        assert_eq!(
            plan.adjustments,
            vec![
                StockAdjustment {
                    target: StockTarget::Product(ProductId::new(10)),
                    quantity: 2,
                },
                StockAdjustment {
                    target: StockTarget::Variant(VariantId::new(100)),
                    quantity: 3,
                },
            ]
        );
        assert_eq!(plan.items[1].variant_name.as_deref(), Some("50ml"));
        assert_eq!(plan.items[1].total_price, dec!(72.00));
    }

    #[test]
    fn test_plan_totals() {
        let lines = [product_line(1, 10, 2, dec!(12.50), 5)];
        let plan = plan_checkout(&lines).unwrap();

        assert_eq!(plan.totals.subtotal, dec!(25.00));
        assert_eq!(plan.totals.tax_amount, dec!(2.00));
        assert_eq!(plan.totals.shipping_amount, dec!(5.99));
        assert_eq!(plan.totals.total_amount, dec!(32.99));
    }

    #[test]
    fn test_plan_subtotal_matches_item_totals() {
        let lines = [
            product_line(1, 10, 3, dec!(19.99), 5),
            product_line(2, 11, 1, dec!(8.5), 5),
        ];
        let plan = plan_checkout(&lines).unwrap();

        let items: Decimal = plan.items.iter().map(|item| item.total_price).sum();
        assert_eq!(plan.totals.subtotal, items);
        assert_eq!(plan.totals.subtotal.to_string(), "68.47");
        assert_eq!(plan.totals.shipping_amount.to_string(), "0.00");
        assert_eq!(plan.totals.total_amount, dec!(73.95));
    }

    #[test]
    fn test_insufficient_stock_rejects_whole_cart() {
        let lines = [
            product_line(1, 10, 1, dec!(10.00), 5),
            product_line(2, 11, 4, dec!(10.00), 3),
        ];

        let Err(CheckoutError::Unavailable(issues)) = plan_checkout(&lines) else {
            panic!("expected unavailable");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].item_id, CartItemId::new(2));
        assert_eq!(issues[0].kind, CartIssueKind::InsufficientStock);
        assert_eq!(issues[0].message, "Only 3 units available for Product 11");
    }

    #[test]
    fn test_variant_stock_is_checked_not_product_stock() {
        let mut line = variant_line(1, 10, 100, 2, 1);
        line.product_stock = 50;

        let issues = validate_lines(&[line]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, CartIssueKind::InsufficientStock);
    }

    #[test]
    fn test_inactive_variant_counts_as_out_of_stock() {
        let mut line = variant_line(1, 10, 100, 1, 20);
        line.variant_active = Some(false);
        assert_eq!(validate_lines(&[line])[0].kind, CartIssueKind::InsufficientStock);
    }

    #[test]
    fn test_inactive_product_reported_first() {
        let mut line = product_line(7, 10, 1, dec!(10.00), 0);
        line.product_active = false;

        let issues = validate_lines(&[line]);
        assert_eq!(issues[0].kind, CartIssueKind::ProductInactive);
        let json = serde_json::to_value(&issues[0]).unwrap();
        assert_eq!(json["type"], "product_inactive");
        assert_eq!(json["item_id"], 7);
    }

    #[test]
    fn test_restock_inverts_checkout() {
        let lines = [
            product_line(1, 10, 2, dec!(12.50), 5),
            variant_line(2, 11, 100, 3, 3),
            product_line(3, 10, 1, dec!(12.50), 5),
        ];
        let plan = plan_checkout(&lines).unwrap();

        let mut stock = HashMap::new();
        stock.insert(StockTarget::Product(ProductId::new(10)), 5);
        stock.insert(StockTarget::Variant(VariantId::new(100)), 3);
        let before = stock.clone();

        apply(&mut stock, &plan.adjustments, -1);
        assert_eq!(stock[&StockTarget::Product(ProductId::new(10))], 2);
        assert_eq!(stock[&StockTarget::Variant(VariantId::new(100))], 0);

        apply(&mut stock, &restock_adjustments(&plan.items), 1);
        assert_eq!(stock, before);
    }
}
