//! Request extractors shared by handlers.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// JSON body that is deserialized and then validated with `validator`.
///
/// Malformed JSON is a 400; a well-formed body with missing or mistyped
/// fields, or one that fails validation, is a 422 with field errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(reject_json)?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn reject_json(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
        AppError::invalid_field("body", rejection.body_text())
    } else {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, routing::post};
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Quantity {
        #[validate(range(min = 1, max = 99, message = "The quantity must be between 1 and 99."))]
        quantity: i32,
    }

    async fn echo(ValidJson(body): ValidJson<Quantity>) -> String {
        body.quantity.to_string()
    }

    async fn send(body: &'static str) -> StatusCode {
        Router::new()
            .route("/", post(echo))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_accepts_valid_body() {
        assert_eq!(send(r#"{"quantity": 3}"#).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rule_violation_is_unprocessable() {
        assert_eq!(
            send(r#"{"quantity": 100}"#).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_unprocessable() {
        assert_eq!(send("{}").await, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        assert_eq!(send("{not json").await, StatusCode::BAD_REQUEST);
    }
}
