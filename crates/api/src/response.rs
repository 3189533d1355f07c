//! Success envelope shared by every JSON endpoint.
//!
//! ```json
//! { "success": true, "message": "Order created successfully", "data": { ... } }
//! ```

use std::borrow::Cow;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{"success": true, "message"?, "data"?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub const fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn with_message(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without a `data` field.
    #[must_use]
    pub fn message(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
