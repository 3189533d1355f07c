//! Order route handlers, including checkout.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use lumina_core::{AddressId, OrderId, PaymentMethod};

use crate::db::OrderRepository;
use crate::db::orders::NewOrder;
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::RequireUser;
use crate::response::ApiResponse;
use crate::routes::Pagination;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub billing_address_id: AddressId,
    pub shipping_address_id: AddressId,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000, message = "The notes may not be greater than 1000 characters."))]
    pub notes: Option<String>,
}

fn order_not_found() -> AppError {
    AppError::NotFound("Order not found".to_owned())
}

/// The caller's orders, newest first.
///
/// GET /api/orders
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.user.id, limit, offset)
        .await?;
    Ok(ApiResponse::data(orders))
}

/// GET /api/orders/{order_id}
///
/// # Errors
///
/// 404 if the order is missing or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let detail = OrderRepository::new(state.pool())
        .get_for_user(current.user.id, order_id)
        .await?
        .ok_or_else(order_not_found)?;
    Ok(ApiResponse::data(detail))
}

/// Check out the caller's cart.
///
/// POST /api/orders
///
/// # Errors
///
/// - 404 if an address is not the caller's
/// - 400 "Cart is empty", or unavailable items with the issue list
/// - 500 "Failed to create order" for anything else; nothing is written
pub async fn store(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<PlaceOrderRequest>,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .place_order(
            current.user.id,
            &NewOrder {
                billing_address_id: body.billing_address_id,
                shipping_address_id: body.shipping_address_id,
                payment_method: body.payment_method,
                notes: body.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            },
        )
        .await?;

    let detail = orders
        .get_for_user(current.user.id, order.id)
        .await
        .map_err(AppError::OrderFailed)?
        .ok_or_else(order_not_found)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Order created successfully", detail),
    ))
}

/// Cancel a pending or processing order and put its stock back.
///
/// POST /api/orders/{order_id}/cancel
///
/// # Errors
///
/// 404 if the order is not the caller's or can no longer be cancelled.
pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = OrderRepository::new(state.pool())
        .cancel(current.user.id, order_id)
        .await?;
    Ok(ApiResponse::with_message("Order cancelled successfully", order))
}

/// GET /api/orders/{order_id}/tracking
///
/// # Errors
///
/// 404 if the order is missing or belongs to someone else.
pub async fn tracking(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let info = OrderRepository::new(state.pool())
        .tracking(current.user.id, order_id)
        .await?
        .ok_or_else(order_not_found)?;
    Ok(ApiResponse::data(info))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_request() {
        let body: PlaceOrderRequest = serde_json::from_str(
            r#"{"billing_address_id":1,"shipping_address_id":2,"payment_method":"credit_card"}"#,
        )
        .unwrap();
        assert_eq!(body.payment_method, PaymentMethod::CreditCard);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_notes_limit() {
        let body = PlaceOrderRequest {
            billing_address_id: AddressId::new(1),
            shipping_address_id: AddressId::new(1),
            payment_method: PaymentMethod::Paypal,
            notes: Some("x".repeat(1001)),
        };
        assert!(body.validate().unwrap_err().field_errors().contains_key("notes"));
    }

    #[test]
    fn test_unknown_payment_method_rejected() {
        let parsed = serde_json::from_str::<PlaceOrderRequest>(
            r#"{"billing_address_id":1,"shipping_address_id":2,"payment_method":"bitcoin"}"#,
        );
        assert!(parsed.is_err());
    }
}
