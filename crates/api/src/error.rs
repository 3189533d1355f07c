//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Failures render the
//! JSON envelope `{"success": false, "message": ...}`, with an `errors`
//! field map for validation failures and `data` for unavailable cart items.
//! Server errors are captured to Sentry before responding.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use lumina_core::CheckoutError;

use crate::db::RepositoryError;
use crate::db::orders::PlaceOrderError;
use crate::services::auth::AuthError;

/// Field name to human-readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart could not be turned into an order.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Writing the order failed for a reason the client can't fix.
    #[error("Order creation failed: {0}")]
    OrderFailed(#[source] RepositoryError),

    /// Request body or query failed validation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_owned(), vec![message.into()]);
        Self::Validation(errors)
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::OrderFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists
                | AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::IncorrectCurrentPassword => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message shown to the client. Internal details never leak.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Resource not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => capitalize(msg),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::OrderFailed(_) => "Failed to create order".to_owned(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_owned(),
                AuthError::InvalidToken => "Unauthenticated.".to_owned(),
                AuthError::AccountDisabled => "Your account has been deactivated".to_owned(),
                AuthError::UserNotFound => "User not found".to_owned(),
                AuthError::UserAlreadyExists
                | AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::IncorrectCurrentPassword => "Validation failed".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_owned()
                }
            },
            Self::Checkout(err) => err.to_string(),
            Self::Validation(_) => "Validation failed".to_owned(),
            Self::RateLimited => "Too many requests".to_owned(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
        }
    }

    /// Field errors for 422 responses.
    fn field_errors(&self) -> Option<FieldErrors> {
        let single = |field: &str, message: &str| {
            let mut errors = FieldErrors::new();
            errors.insert(field.to_owned(), vec![message.to_owned()]);
            errors
        };

        match self {
            Self::Validation(errors) => Some(errors.clone()),
            Self::Auth(AuthError::UserAlreadyExists) => {
                Some(single("email", "The email has already been taken."))
            }
            Self::Auth(AuthError::InvalidEmail(_)) => {
                Some(single("email", "The email must be a valid email address."))
            }
            Self::Auth(AuthError::WeakPassword(msg)) => Some(single("password", msg)),
            Self::Auth(AuthError::IncorrectCurrentPassword) => Some(single(
                "current_password",
                "The current password is incorrect.",
            )),
            _ => None,
        }
    }
}

impl From<PlaceOrderError> for AppError {
    fn from(err: PlaceOrderError) -> Self {
        match err {
            PlaceOrderError::AddressNotFound => Self::NotFound("Address not found".to_owned()),
            PlaceOrderError::Checkout(e) => Self::Checkout(e),
            PlaceOrderError::Repository(e) => Self::OrderFailed(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|error| {
                        error.message.as_ref().map_or_else(
                            || format!("The {field} field is invalid."),
                            ToString::to_string,
                        )
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        Self::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({
            "success": false,
            "message": self.public_message(),
        });

        if let Some(errors) = self.field_errors() {
            body["errors"] = json!(errors);
        }
        if let Self::Checkout(CheckoutError::Unavailable(issues)) = &self {
            body["data"] = json!({ "valid": false, "issues": issues });
        }

        (status, Json(body)).into_response()
    }
}

fn capitalize(msg: &str) -> String {
    let mut chars = msg.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use lumina_core::{CartIssue, CartIssueKind, CartItemId};
    use validator::Validate;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("x".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_empty_cart_envelope() {
        let (status, body) = render(CheckoutError::EmptyCart.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Cart is empty");
    }

    #[tokio::test]
    async fn test_unavailable_items_carry_issues() {
        let issue = CartIssue {
            item_id: CartItemId::new(3),
            kind: CartIssueKind::InsufficientStock,
            message: "Only 1 units available for Serum".to_owned(),
        };
        let (status, body) = render(CheckoutError::Unavailable(vec![issue]).into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Some items in your cart are no longer available"
        );
        assert_eq!(body["data"]["valid"], false);
        assert_eq!(body["data"]["issues"][0]["item_id"], 3);
        assert_eq!(body["data"]["issues"][0]["type"], "insufficient_stock");
    }

    #[tokio::test]
    async fn test_order_failure_hides_internal_message() {
        let err: AppError = PlaceOrderError::Repository(RepositoryError::DataCorruption(
            "secret table detail".to_owned(),
        ))
        .into();
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to create order");
        assert!(!body.to_string().contains("secret table detail"));
    }

    #[tokio::test]
    async fn test_foreign_address_is_not_found() {
        let (status, body) = render(PlaceOrderError::AddressNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Address not found");
    }

    #[derive(Debug, Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "The name field is required."))]
        name: String,
        #[validate(range(min = 1, max = 99))]
        quantity: i32,
    }

    #[tokio::test]
    async fn test_validation_errors_become_field_map() {
        let sample = Sample {
            name: String::new(),
            quantity: 0,
        };
        let err: AppError = sample.validate().unwrap_err().into();
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"]["name"][0], "The name field is required.");
        assert_eq!(body["errors"]["quantity"][0], "The quantity field is invalid.");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_field_error() {
        let (status, body) = render(AuthError::UserAlreadyExists.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["email"][0], "The email has already been taken.");
    }

    #[tokio::test]
    async fn test_conflict_message_is_capitalized() {
        let err = AppError::Database(RepositoryError::Conflict(
            "address is used by an order".to_owned(),
        ));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Address is used by an order");
    }
}
