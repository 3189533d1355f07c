//! Admin route handlers: order fulfilment, stock report, staff accounts and
//! the support desk.
//!
//! Every handler takes [`RequireAdmin`] (or [`RequireSuperAdmin`]), so the
//! role gate runs before any body is parsed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use lumina_core::{
    OrderId, OrderStatus, TicketId, TicketPriority, TicketStatus, UserId, UserRole,
};

use crate::db::orders::{OrderFilter, StatusUpdate};
use crate::db::support::TicketUpdate;
use crate::db::users::UserFilter;
use crate::db::{
    CatalogRepository, OrderRepository, RepositoryError, SupportRepository, UserRepository,
};
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::{RequireAdmin, RequireSuperAdmin};
use crate::response::ApiResponse;
use crate::routes::Pagination;
use crate::routes::support::{MessageRequest, TicketQuery, ticket_not_found};
use crate::services::auth::AuthService;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 20;
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
    #[validate(length(max = 100))]
    pub carrier: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// All orders, newest first.
///
/// GET /api/admin/orders
///
/// # Errors
///
/// 401/403 for non-admins.
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let filter = OrderFilter {
        status: query.status,
        user_id: query.user_id,
    };
    let orders = OrderRepository::new(state.pool())
        .list_all(filter, limit, offset)
        .await?;
    Ok(ApiResponse::data(orders))
}

/// Move an order to a new status.
///
/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// 404 for an unknown order; 409 when reviving a cancelled, refunded or
/// failed order.
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    ValidJson(body): ValidJson<OrderStatusRequest>,
) -> Result<impl IntoResponse> {
    let order = OrderRepository::new(state.pool())
        .update_status(
            id,
            &StatusUpdate {
                status: body.status,
                tracking_number: non_blank(body.tracking_number.as_deref()),
                carrier: non_blank(body.carrier.as_deref()),
                note: non_blank(body.note.as_deref()),
            },
        )
        .await?;

    tracing::info!(
        admin_id = %admin.user.id,
        order_number = %order.order_number,
        status = %order.status,
        "order status updated"
    );

    Ok(ApiResponse::with_message(
        "Order status updated successfully",
        order,
    ))
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

/// Products and variants at or below the stock threshold.
///
/// GET /api/admin/reports/low-stock?threshold=
///
/// # Errors
///
/// 400 for a negative threshold.
pub async fn low_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<LowStockQuery>,
) -> Result<impl IntoResponse> {
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    if threshold < 0 {
        return Err(AppError::BadRequest(
            "Threshold must not be negative".to_owned(),
        ));
    }

    let entries = CatalogRepository::new(state.pool())
        .low_stock(threshold)
        .await?;
    Ok(ApiResponse::data(entries))
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// GET /api/admin/users
///
/// # Errors
///
/// 401/403 for non-admins.
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let filter = UserFilter {
        role: query.role,
        search: non_blank(query.search.as_deref()),
    };
    let users = UserRepository::new(state.pool())
        .list(&filter, limit, offset)
        .await?;
    Ok(ApiResponse::data(users))
}

/// Create an `admin` or `super_admin` account.
///
/// POST /api/admin/users
///
/// # Errors
///
/// 422 for a customer role, weak password or duplicate email; 403 when a
/// plain admin tries to create a super admin.
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidJson(body): ValidJson<CreateStaffRequest>,
) -> Result<impl IntoResponse> {
    if !body.role.is_admin() {
        return Err(AppError::invalid_field(
            "role",
            "The selected role is invalid.",
        ));
    }
    if body.role == UserRole::SuperAdmin && admin.user.role != UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Only a super admin can create super admin accounts".to_owned(),
        ));
    }

    let user = AuthService::new(state.pool())
        .create_account(
            body.name.trim(),
            &body.email,
            &body.password,
            None,
            None,
            body.role,
        )
        .await?;

    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user.id,
        role = %user.role,
        "staff account created"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Admin user created successfully", user),
    ))
}

/// PUT /api/admin/users/{id}/role
///
/// # Errors
///
/// 403 unless the caller is a super admin; 400 when changing one's own role.
pub async fn update_user_role(
    State(state): State<AppState>,
    RequireSuperAdmin(current): RequireSuperAdmin,
    Path(id): Path<UserId>,
    ValidJson(body): ValidJson<RoleRequest>,
) -> Result<impl IntoResponse> {
    if id == current.user.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_owned(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .update_role(id, body.role)
        .await?;

    tracing::info!(
        admin_id = %current.user.id,
        user_id = %user.id,
        role = %user.role,
        "user role changed"
    );

    Ok(ApiResponse::with_message("User role updated successfully", user))
}

// =============================================================================
// Support desk
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct TicketUpdateRequest {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

/// Every user's tickets.
///
/// GET /api/admin/support/tickets
///
/// # Errors
///
/// 401/403 for non-admins.
pub async fn tickets(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<TicketQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let tickets = SupportRepository::new(state.pool())
        .list(None, query.status, limit, offset)
        .await?;
    Ok(ApiResponse::data(tickets))
}

/// PUT /api/admin/support/tickets/{id}
///
/// # Errors
///
/// 400 when neither field is given; 404 for an unknown ticket.
pub async fn update_ticket(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<TicketId>,
    ValidJson(body): ValidJson<TicketUpdateRequest>,
) -> Result<impl IntoResponse> {
    if body.status.is_none() && body.priority.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_owned()));
    }

    let ticket = SupportRepository::new(state.pool())
        .update(
            id,
            TicketUpdate {
                status: body.status,
                priority: body.priority,
            },
        )
        .await?;
    Ok(ApiResponse::with_message("Ticket updated successfully", ticket))
}

/// Staff reply; an open ticket moves to in progress.
///
/// POST /api/admin/support/tickets/{id}/messages
///
/// # Errors
///
/// 404 for an unknown ticket.
pub async fn reply_ticket(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<TicketId>,
    ValidJson(body): ValidJson<MessageRequest>,
) -> Result<impl IntoResponse> {
    let message = SupportRepository::new(state.pool())
        .add_staff_reply(admin.user.id, id, body.message.trim())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ticket_not_found(),
            other => other.into(),
        })?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Message added successfully", message),
    ))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Uri;

    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  UPS ")), Some("UPS"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_order_query_filters() {
        let uri: Uri = "/api/admin/orders?status=out_for_delivery&user_id=12"
            .parse()
            .unwrap();
        let query = Query::<OrderQuery>::try_from_uri(&uri).unwrap().0;
        assert_eq!(query.status, Some(OrderStatus::OutForDelivery));
        assert_eq!(query.user_id, Some(UserId::new(12)));
    }

    #[test]
    fn test_status_request() {
        let body: OrderStatusRequest = serde_json::from_str(
            r#"{"status":"shipped","tracking_number":"1Z999","carrier":"UPS"}"#,
        )
        .unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_user_query_role() {
        let uri: Uri = "/api/admin/users?role=super_admin&search=ada".parse().unwrap();
        let query = Query::<UserQuery>::try_from_uri(&uri).unwrap().0;
        assert_eq!(query.role, Some(UserRole::SuperAdmin));
        assert_eq!(query.search.as_deref(), Some("ada"));
    }
}
