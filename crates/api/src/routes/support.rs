//! Customer support ticket handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use lumina_core::{OrderId, TicketCategory, TicketId, TicketPriority, TicketStatus};

use crate::db::SupportRepository;
use crate::db::support::NewTicket;
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::RequireUser;
use crate::response::ApiResponse;
use crate::routes::Pagination;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 15;

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TicketRequest {
    #[validate(length(min = 1, max = 255, message = "The subject field is required."))]
    pub subject: String,
    #[validate(length(min = 1, message = "The description field is required."))]
    pub description: String,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageRequest {
    #[validate(length(min = 1, message = "The message field is required."))]
    pub message: String,
}

pub(crate) fn ticket_not_found() -> AppError {
    AppError::NotFound("Ticket not found".to_owned())
}

/// The caller's tickets, newest first.
///
/// GET /api/support/tickets
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Query(query): Query<TicketQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let tickets = SupportRepository::new(state.pool())
        .list(Some(current.user.id), query.status, limit, offset)
        .await?;
    Ok(ApiResponse::data(tickets))
}

/// POST /api/support/tickets
///
/// # Errors
///
/// 422 on validation failure; 404 if `order_id` is not the caller's order.
pub async fn store(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<TicketRequest>,
) -> Result<impl IntoResponse> {
    let ticket = SupportRepository::new(state.pool())
        .create(
            current.user.id,
            &NewTicket {
                subject: body.subject.trim(),
                description: &body.description,
                priority: body.priority,
                category: body.category,
                order_id: body.order_id,
            },
        )
        .await?;

    tracing::info!(ticket_number = %ticket.ticket_number, "support ticket opened");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Support ticket created successfully", ticket),
    ))
}

/// GET /api/support/tickets/{id}
///
/// # Errors
///
/// 404 if the ticket is not the caller's.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<TicketId>,
) -> Result<impl IntoResponse> {
    let detail = SupportRepository::new(state.pool())
        .get_detail(id, Some(current.user.id))
        .await?
        .ok_or_else(ticket_not_found)?;
    Ok(ApiResponse::data(detail))
}

/// Reply on a ticket. A resolved ticket goes back to open.
///
/// POST /api/support/tickets/{id}/messages
///
/// # Errors
///
/// 404 if the ticket is not the caller's.
pub async fn add_message(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<TicketId>,
    ValidJson(body): ValidJson<MessageRequest>,
) -> Result<impl IntoResponse> {
    let message = SupportRepository::new(state.pool())
        .add_message(current.user.id, id, body.message.trim())
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Message added successfully", message),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Uri;

    use super::*;

    #[test]
    fn test_ticket_request() {
        let body: TicketRequest = serde_json::from_str(
            r#"{"subject":"Damaged bottle","description":"Cap was cracked",
                "priority":"high","category":"order","order_id":7}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.priority, TicketPriority::High);
        assert_eq!(body.category, TicketCategory::Order);
        assert_eq!(body.order_id, Some(OrderId::new(7)));
    }

    #[test]
    fn test_ticket_request_requires_priority() {
        let parsed = serde_json::from_str::<TicketRequest>(
            r#"{"subject":"Hi","description":"Question","category":"other"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_filter() {
        let uri: Uri = "/api/support/tickets?status=in_progress".parse().unwrap();
        let query = Query::<TicketQuery>::try_from_uri(&uri).unwrap().0;
        assert_eq!(query.status, Some(TicketStatus::InProgress));
    }
}
