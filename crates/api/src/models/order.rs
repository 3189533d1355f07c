//! Order domain types.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use lumina_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    UserId, VariantId,
};

use super::Address;

/// Days between shipment and the delivery estimate shown to customers.
pub const DELIVERY_ESTIMATE_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub billing_address_id: AddressId,
    pub shipping_address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a purchased line.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingEvent {
    pub status: OrderStatus,
    pub description: String,
    pub tracked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingInfo {
    pub order_number: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub history: Vec<TrackingEvent>,
}

impl TrackingInfo {
    #[must_use]
    pub fn new(order: Order, history: Vec<TrackingEvent>) -> Self {
        Self {
            estimated_delivery: order
                .shipped_at
                .map(|shipped| shipped + Duration::days(DELIVERY_ESTIMATE_DAYS)),
            order_number: order.order_number,
            status: order.status,
            tracking_number: order.tracking_number,
            carrier: order.carrier,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            history,
        }
    }
}
