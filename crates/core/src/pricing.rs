//! Checkout arithmetic.
//!
//! All amounts are `Decimal` in the store currency's standard unit (dollars,
//! not cents) and are rounded to cents with midpoint-away-from-zero, matching
//! how the amounts are persisted in `NUMERIC(10, 2)` columns.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Sales tax applied to the order subtotal.
pub const TAX_RATE: Decimal = dec!(0.08);

/// Subtotals strictly above this amount ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = dec!(50.00);

/// Flat shipping fee charged at or below the threshold.
pub const FLAT_SHIPPING: Decimal = dec!(5.99);

/// Currency recorded on every order.
pub const CURRENCY: &str = "USD";

/// Round an amount to cents, always carrying exactly two decimal places.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    let mut cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    cents
}

/// Total for one line: `unit_price * quantity`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    round_cents(unit_price * Decimal::from(quantity))
}

/// The price a customer pays: the sale price when one is set and lower than
/// the list price, otherwise the list price.
#[must_use]
pub fn effective_price(price: Decimal, sale_price: Option<Decimal>) -> Decimal {
    match sale_price {
        Some(sale) if sale < price => sale,
        _ => price,
    }
}

/// Shipping charged for a given subtotal.
#[must_use]
pub fn shipping_for(subtotal: Decimal) -> Decimal {
    if subtotal > FREE_SHIPPING_THRESHOLD {
        dec!(0.00)
    } else {
        FLAT_SHIPPING
    }
}

/// Computed money columns of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Derive tax, shipping and grand total from a subtotal.
    ///
    /// ```
    /// use lumina_core::OrderTotals;
    /// use rust_decimal_macros::dec;
    ///
    /// let totals = OrderTotals::from_subtotal(dec!(40.00));
    /// assert_eq!(totals.tax_amount, dec!(3.20));
    /// assert_eq!(totals.shipping_amount, dec!(5.99));
    /// assert_eq!(totals.total_amount, dec!(49.19));
    /// ```
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let subtotal = round_cents(subtotal);
        let tax_amount = round_cents(subtotal * TAX_RATE);
        let shipping_amount = shipping_for(subtotal);

        Self {
            subtotal,
            tax_amount,
            shipping_amount,
            total_amount: subtotal + tax_amount + shipping_amount,
        }
    }

    /// Sum line totals and derive the rest.
    #[must_use]
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal = lines
            .into_iter()
            .map(|(unit_price, quantity)| line_total(unit_price, quantity))
            .sum();
        Self::from_subtotal(subtotal)
    }
}
