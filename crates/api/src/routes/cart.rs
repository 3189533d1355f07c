//! Cart route handlers.
//!
//! Every route requires a bearer token; the cart is created on first access.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use lumina_core::{CartIssue, CartItemId, ProductId, VariantId, validate_lines};

use crate::db::{CartRepository, CatalogRepository};
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::RequireUser;
use crate::models::{CartSummary, CartView};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[validate(range(min = 1, max = 99, message = "The quantity must be between 1 and 99."))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, max = 99, message = "The quantity must be between 1 and 99."))]
    pub quantity: i32,
}

/// The cart with its derived totals.
#[derive(Debug, Serialize)]
pub struct CartPayload {
    #[serde(flatten)]
    pub cart: CartView,
    pub items_count: usize,
    pub total_amount: Decimal,
}

impl From<CartView> for CartPayload {
    fn from(cart: CartView) -> Self {
        Self {
            items_count: cart.items_count(),
            total_amount: cart.total_amount(),
            cart,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<CartIssue>,
}

/// GET /api/cart
///
/// # Errors
///
/// 401 without a token.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let cart = CartRepository::new(state.pool())
        .get_or_create(current.user.id)
        .await?;
    Ok(ApiResponse::data(CartPayload::from(cart)))
}

/// Add a product (or one of its variants) to the cart.
///
/// POST /api/cart/items
///
/// # Errors
///
/// 404 for a missing or inactive product; 422 when the variant is not one of
/// the product's active variants.
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<AddItemRequest>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    let product = catalog
        .get_product(body.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    let unit_price = match body.variant_id {
        Some(variant_id) => catalog
            .get_variant(variant_id)
            .await?
            .filter(|v| v.product_id == product.id && v.is_active)
            .ok_or_else(|| {
                AppError::invalid_field("variant_id", "The selected variant id is invalid.")
            })?
            .current_price(),
        None => product.current_price(),
    };

    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(current.user.id).await?;
    carts
        .add_item(cart.id, product.id, body.variant_id, body.quantity, unit_price)
        .await?;

    let cart = carts.get_or_create(current.user.id).await?;
    Ok(ApiResponse::with_message(
        "Item added to cart successfully",
        CartPayload::from(cart),
    ))
}

/// PUT /api/cart/items/{item_id}
///
/// # Errors
///
/// 404 if the line is not in the caller's cart.
pub async fn update_item(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(item_id): Path<CartItemId>,
    ValidJson(body): ValidJson<UpdateItemRequest>,
) -> Result<impl IntoResponse> {
    let carts = CartRepository::new(state.pool());
    carts
        .update_quantity(current.user.id, item_id, body.quantity)
        .await?;

    let cart = carts.get_or_create(current.user.id).await?;
    Ok(ApiResponse::with_message(
        "Cart item updated successfully",
        CartPayload::from(cart),
    ))
}

/// DELETE /api/cart/items/{item_id}
///
/// # Errors
///
/// 404 if the line is not in the caller's cart.
pub async fn remove_item(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(item_id): Path<CartItemId>,
) -> Result<impl IntoResponse> {
    let carts = CartRepository::new(state.pool());
    carts.remove_item(current.user.id, item_id).await?;

    let cart = carts.get_or_create(current.user.id).await?;
    Ok(ApiResponse::with_message(
        "Item removed from cart successfully",
        CartPayload::from(cart),
    ))
}

/// DELETE /api/cart/clear
///
/// # Errors
///
/// 500 on database failure.
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let removed = CartRepository::new(state.pool())
        .clear(current.user.id)
        .await?;
    tracing::debug!(user_id = %current.user.id, removed, "cart cleared");

    Ok(ApiResponse::message("Cart cleared successfully"))
}

/// GET /api/cart/summary
///
/// # Errors
///
/// 500 on database failure.
pub async fn summary(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let cart = CartRepository::new(state.pool())
        .get_or_create(current.user.id)
        .await?;
    Ok(ApiResponse::data(CartSummary::from(cart)))
}

/// Check every line against current catalog state without changing anything.
///
/// GET /api/cart/validate
///
/// # Errors
///
/// 500 on database failure.
pub async fn validate(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let lines = CartRepository::new(state.pool())
        .lines(current.user.id)
        .await?;
    let issues = validate_lines(&lines);

    Ok(ApiResponse::data(ValidationReport {
        valid: issues.is_empty(),
        issues,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        let parse = |json: &str| serde_json::from_str::<AddItemRequest>(json).unwrap();

        assert!(parse(r#"{"product_id":1,"quantity":1}"#).validate().is_ok());
        assert!(parse(r#"{"product_id":1,"variant_id":4,"quantity":99}"#)
            .validate()
            .is_ok());
        assert!(parse(r#"{"product_id":1,"quantity":0}"#).validate().is_err());
        assert!(parse(r#"{"product_id":1,"quantity":100}"#).validate().is_err());
    }

    #[test]
    fn test_update_rejects_zero() {
        let body: UpdateItemRequest = serde_json::from_str(r#"{"quantity":0}"#).unwrap();
        let errors = body.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
    }
}
