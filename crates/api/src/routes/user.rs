//! User account route handlers: stats, the address book, the wishlist and
//! recently viewed products.
//!
//! Profile reads and updates share the handlers in [`super::auth`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use lumina_core::{AddressId, AddressType, ProductId};

use crate::db::addresses::AddressInput;
use crate::db::{
    AddressRepository, CatalogRepository, RepositoryError, UserRepository, WishlistRepository,
};
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::RequireUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Products returned by the recently viewed listing.
const RECENTLY_VIEWED_LIMIT: i64 = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[validate(length(min = 1, max = 255, message = "The first name field is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "The last name field is required."))]
    pub last_name: String,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    #[validate(length(min = 1, max = 255, message = "The address line 1 field is required."))]
    pub address_line_1: String,
    #[validate(length(max = 255))]
    pub address_line_2: Option<String>,
    #[validate(length(min = 1, max = 255, message = "The city field is required."))]
    pub city: String,
    #[validate(length(min = 1, max = 255, message = "The state field is required."))]
    pub state: String,
    #[validate(length(min = 1, max = 20, message = "The postal code field is required."))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2, message = "The country must be 2 characters."))]
    pub country: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl From<AddressRequest> for AddressInput {
    fn from(body: AddressRequest) -> Self {
        Self {
            address_type: body.address_type,
            first_name: body.first_name,
            last_name: body.last_name,
            company: body.company,
            address_line_1: body.address_line_1,
            address_line_2: body.address_line_2,
            city: body.city,
            state: body.state,
            postal_code: body.postal_code,
            country: body.country.to_ascii_uppercase(),
            phone: body.phone,
            is_default: body.is_default,
        }
    }
}

/// GET /api/user/stats
///
/// # Errors
///
/// 500 on database failure.
pub async fn stats(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let stats = UserRepository::new(state.pool())
        .stats(current.user.id)
        .await?;
    Ok(ApiResponse::data(stats))
}

/// GET /api/user/addresses
///
/// # Errors
///
/// 500 on database failure.
pub async fn addresses(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let addresses = AddressRepository::new(state.pool())
        .list(current.user.id)
        .await?;
    Ok(ApiResponse::data(addresses))
}

/// POST /api/user/addresses
///
/// # Errors
///
/// 422 on validation failure.
pub async fn create_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<AddressRequest>,
) -> Result<impl IntoResponse> {
    let address = AddressRepository::new(state.pool())
        .create(current.user.id, &body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Address created successfully", address),
    ))
}

/// PUT /api/user/addresses/{id}
///
/// # Errors
///
/// 404 if the address is not the caller's.
pub async fn update_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<AddressId>,
    ValidJson(body): ValidJson<AddressRequest>,
) -> Result<impl IntoResponse> {
    let address = AddressRepository::new(state.pool())
        .update(current.user.id, id, &body.into())
        .await?;
    Ok(ApiResponse::with_message("Address updated successfully", address))
}

/// DELETE /api/user/addresses/{id}
///
/// # Errors
///
/// 404 if the address is not the caller's; 409 if an order references it.
pub async fn delete_address(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<impl IntoResponse> {
    AddressRepository::new(state.pool())
        .delete(current.user.id, id)
        .await?;
    Ok(ApiResponse::message("Address deleted successfully"))
}

/// GET /api/user/wishlist
///
/// # Errors
///
/// 500 on database failure.
pub async fn wishlist(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let items = WishlistRepository::new(state.pool())
        .list(current.user.id)
        .await?;
    Ok(ApiResponse::data(items))
}

/// POST /api/user/wishlist
///
/// # Errors
///
/// 422 if the product doesn't exist; 400 if it is already saved.
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<WishlistRequest>,
) -> Result<impl IntoResponse> {
    CatalogRepository::new(state.pool())
        .get_product(body.product_id)
        .await?
        .ok_or_else(|| {
            AppError::invalid_field("product_id", "The selected product id is invalid.")
        })?;

    let wishlists = WishlistRepository::new(state.pool());
    if wishlists.contains(current.user.id, body.product_id).await? {
        return Err(already_saved());
    }

    let item = wishlists
        .add(current.user.id, body.product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => already_saved(),
            other => other.into(),
        })?;

    Ok(ApiResponse::with_message("Product added to wishlist", item))
}

/// DELETE /api/user/wishlist/{product_id}
///
/// # Errors
///
/// 404 if the product isn't in the caller's wishlist.
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    WishlistRepository::new(state.pool())
        .remove(current.user.id, product_id)
        .await?;
    Ok(ApiResponse::message("Product removed from wishlist"))
}

/// GET /api/user/recently-viewed
///
/// # Errors
///
/// 500 on database failure.
pub async fn recently_viewed(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let products = CatalogRepository::new(state.pool())
        .recently_viewed(current.user.id, RECENTLY_VIEWED_LIMIT)
        .await?;
    Ok(ApiResponse::data(products))
}

fn already_saved() -> AppError {
    AppError::BadRequest("Product already in wishlist".to_owned())
}
