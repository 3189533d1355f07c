//! Support ticket domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumina_core::{
    OrderId, TicketCategory, TicketId, TicketMessageId, TicketPriority, TicketStatus, UserId,
};

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub ticket_number: String,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub message: String,
    pub is_staff_reply: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    /// Oldest first.
    pub messages: Vec<TicketMessage>,
}
