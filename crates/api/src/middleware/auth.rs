//! Bearer token authentication extractors.
//!
//! Handlers declare the access they need by extractor:
//!
//! ```rust,ignore
//! async fn list_orders(RequireUser(current): RequireUser) -> impl IntoResponse { ... }
//! async fn low_stock(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse { ... }
//! async fn show_product(OptionalUser(viewer): OptionalUser) -> impl IntoResponse { ... }
//! ```
//!
//! The resolved user is cached in request extensions, so stacking extractors
//! costs one token lookup.

use std::convert::Infallible;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use lumina_core::{ApiTokenId, UserRole};

use crate::error::set_sentry_user;
use crate::models::User;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// The authenticated caller and the token they presented.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token_id: ApiTokenId,
}

/// Why an extractor refused the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// No usable bearer token on a customer route.
    Unauthenticated,
    /// No usable bearer token on an admin route.
    AuthenticationRequired,
    /// Account is deactivated.
    Disabled,
    /// Authenticated, but not an admin.
    AdminRequired,
    /// Authenticated admin, but not a super admin.
    SuperAdminRequired,
    /// Token lookup failed.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated."),
            Self::AuthenticationRequired => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::Disabled => (StatusCode::FORBIDDEN, "Your account has been deactivated"),
            Self::AdminRequired => (
                StatusCode::FORBIDDEN,
                "Admin access required. You do not have permission to access this resource.",
            ),
            Self::SuperAdminRequired => (
                StatusCode::FORBIDDEN,
                "Super admin access required. You do not have permission to access this resource.",
            ),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller, or `None` when no valid token was presented.
async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, AuthRejection> {
    if let Some(current) = parts.extensions.get::<CurrentUser>() {
        return Ok(Some(current.clone()));
    }

    let Some(token) = bearer_token(parts) else {
        return Ok(None);
    };

    match AuthService::new(state.pool()).authenticate(token).await {
        Ok((user, token_id)) => {
            set_sentry_user(&user.id, Some(user.email.as_str()));
            tracing::Span::current().record("user_id", user.id.as_i64());
            let current = CurrentUser { user, token_id };
            parts.extensions.insert(current.clone());
            Ok(Some(current))
        }
        Err(AuthError::InvalidToken) => Ok(None),
        Err(AuthError::AccountDisabled) => Err(AuthRejection::Disabled),
        Err(e) => {
            tracing::error!(error = %e, "token lookup failed");
            Err(AuthRejection::Internal)
        }
    }
}

/// Extractor that requires a valid bearer token.
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .map(Self)
            .ok_or(AuthRejection::Unauthenticated)
    }
}

/// Extractor that resolves the caller on public routes.
///
/// Never rejects: a missing, invalid or deactivated token yields `None`.
pub struct OptionalUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await.ok().flatten()))
    }
}

/// Extractor that requires an `admin` or `super_admin`.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = resolve(parts, state)
            .await?
            .ok_or(AuthRejection::AuthenticationRequired)?;

        if !current.user.role.is_admin() {
            tracing::warn!(user_id = %current.user.id, "non-admin hit admin route");
            return Err(AuthRejection::AdminRequired);
        }

        Ok(Self(current))
    }
}

/// Extractor that requires a `super_admin`.
pub struct RequireSuperAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = resolve(parts, state)
            .await?
            .ok_or(AuthRejection::AuthenticationRequired)?;

        if current.user.role != UserRole::SuperAdmin {
            return Err(AuthRejection::SuperAdminRequired);
        }

        Ok(Self(current))
    }
}
