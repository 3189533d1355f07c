//! Auth route handlers: registration, login, tokens and the caller's profile.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use lumina_core::SkinType;

use crate::db::users::ProfileUpdate;
use crate::db::{AddressRepository, OrderRepository, UserRepository};
use crate::error::Result;
use crate::extract::ValidJson;
use crate::middleware::RequireUser;
use crate::models::{Address, Order, User};
use crate::response::ApiResponse;
use crate::services::auth::{AuthService, IssuedToken, Registration};
use crate::state::AppState;

/// Orders shown on the profile page.
const RECENT_ORDERS: i64 = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    #[validate(must_match(
        other = "password",
        message = "The password confirmation does not match."
    ))]
    pub password_confirmation: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub skin_type: Option<SkinType>,
    #[validate(length(max = 255))]
    pub device_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "The email field is required."))]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
    #[validate(length(max = 255))]
    pub device_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub skin_type: Option<SkinType>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "The current password field is required."))]
    pub current_password: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    #[validate(must_match(
        other = "password",
        message = "The password confirmation does not match."
    ))]
    pub password_confirmation: String,
}

/// User plus the bearer token to send as `Authorization: Bearer <token>`.
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
    pub token_type: &'static str,
}

impl AuthPayload {
    fn new(user: User, token: IssuedToken) -> Self {
        Self {
            user,
            token: token.plain_text,
            token_type: "Bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPayload {
    pub token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: User,
    pub addresses: Vec<Address>,
    pub recent_orders: Vec<Order>,
}

/// Create a customer account.
///
/// POST /api/auth/register
///
/// # Errors
///
/// 422 on validation failure, weak password, or duplicate email.
pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (user, token) = AuthService::new(state.pool())
        .register(&Registration {
            name: body.name.trim(),
            email: &body.email,
            password: &body.password,
            phone: body.phone.as_deref(),
            skin_type: body.skin_type,
            device_name: body.device_name.as_deref(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", AuthPayload::new(user, token)),
    ))
}

/// Exchange credentials for a bearer token.
///
/// POST /api/auth/login
///
/// # Errors
///
/// 401 "Invalid credentials"; 403 if the account is deactivated.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (user, token) = AuthService::new(state.pool())
        .login(&body.email, &body.password, body.device_name.as_deref())
        .await?;

    Ok(ApiResponse::with_message(
        "Login successful",
        AuthPayload::new(user, token),
    ))
}

/// Revoke the token used for this request.
///
/// POST /api/auth/logout
///
/// # Errors
///
/// 500 if the token row cannot be deleted.
pub async fn logout(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    AuthService::new(state.pool())
        .logout(current.token_id, current.user.id)
        .await?;

    Ok(ApiResponse::message("Logout successful"))
}

/// The caller with their addresses and latest orders.
///
/// GET /api/auth/profile, GET /api/user/profile
///
/// # Errors
///
/// 500 on database failure.
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let user_id = current.user.id;
    let addresses = AddressRepository::new(state.pool()).list(user_id).await?;
    let recent_orders = OrderRepository::new(state.pool())
        .list_for_user(user_id, RECENT_ORDERS, 0)
        .await?;

    Ok(ApiResponse::data(ProfileView {
        user: current.user,
        addresses,
        recent_orders,
    }))
}

/// Update name, phone or skin type.
///
/// PUT /api/auth/profile, PUT /api/user/profile
///
/// # Errors
///
/// 422 on validation failure.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse> {
    let user = UserRepository::new(state.pool())
        .update_profile(
            current.user.id,
            &ProfileUpdate {
                name: body.name.as_deref().map(str::trim),
                phone: body.phone.as_deref(),
                skin_type: body.skin_type,
            },
        )
        .await?;

    Ok(ApiResponse::with_message("Profile updated successfully", user))
}

/// Change the password; every existing token is revoked.
///
/// PUT /api/auth/change-password
///
/// # Errors
///
/// 422 if the current password is wrong or the new one is weak.
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    let token = AuthService::new(state.pool())
        .change_password(current.user.id, &body.current_password, &body.password)
        .await?;

    Ok(ApiResponse::with_message(
        "Password changed successfully",
        TokenPayload {
            token: token.plain_text,
            token_type: "Bearer",
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration(password: &str, confirmation: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".to_owned(),
            email: "ada@example.com".to_owned(),
            password: password.to_owned(),
            password_confirmation: confirmation.to_owned(),
            phone: None,
            skin_type: Some(SkinType::Combination),
            device_name: None,
        }
    }

    #[test]
    fn test_register_request_validation() {
        assert!(registration("Secret123", "Secret123").validate().is_ok());

        let errors = registration("Secret123", "Secret124").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password_confirmation"));

        let errors = registration("short", "short").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_register_request_rejects_bad_email() {
        let mut request = registration("Secret123", "Secret123");
        request.email = "not-an-email".to_owned();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_skin_type_deserializes_snake_case() {
        let body: RegisterRequest = serde_json::from_str(
            r#"{"name":"Ada","email":"ada@example.com","password":"Secret123",
                "password_confirmation":"Secret123","skin_type":"sensitive"}"#,
        )
        .unwrap();
        assert_eq!(body.skin_type, Some(SkinType::Sensitive));
    }
}
