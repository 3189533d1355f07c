//! Support ticket repository.

use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lumina_core::{
    OrderId, TicketCategory, TicketId, TicketMessageId, TicketNumber, TicketPriority,
    TicketStatus, UserId,
};

use super::RepositoryError;
use crate::models::{Ticket, TicketDetail, TicketMessage};

const TICKET_COLUMNS: &str = "id, ticket_number, user_id, order_id, subject, description, \
     status, priority, category, resolved_at, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, ticket_id, user_id, message, is_staff_reply, created_at";

/// Advisory lock key serializing ticket numbering.
const TICKET_NUMBER_LOCK: i64 = 0x544b_544e;

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: i64,
    ticket_number: String,
    user_id: i64,
    order_id: Option<i64>,
    subject: String,
    description: String,
    status: TicketStatus,
    priority: TicketPriority,
    category: TicketCategory,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: TicketId::new(row.id),
            ticket_number: row.ticket_number,
            user_id: UserId::new(row.user_id),
            order_id: row.order_id.map(OrderId::new),
            subject: row.subject,
            description: row.description,
            status: row.status,
            priority: row.priority,
            category: row.category,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    ticket_id: i64,
    user_id: i64,
    message: String,
    is_staff_reply: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for TicketMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: TicketMessageId::new(row.id),
            ticket_id: TicketId::new(row.ticket_id),
            user_id: UserId::new(row.user_id),
            message: row.message,
            is_staff_reply: row.is_staff_reply,
            created_at: row.created_at,
        }
    }
}

/// A ticket as opened by a customer.
#[derive(Debug, Clone)]
pub struct NewTicket<'a> {
    pub subject: &'a str,
    pub description: &'a str,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub order_id: Option<OrderId>,
}

/// Staff changes to a ticket.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

/// Repository for support tickets and their messages.
pub struct SupportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SupportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Tickets, newest first. `user_id` of `None` lists every user's tickets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            SELECT {TICKET_COLUMNS}
            FROM support_tickets
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::ticket_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(user_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Open a ticket with the next `TKT-` number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `order_id` isn't one of the user's orders.
    #[instrument(skip(self, ticket), fields(category = ?ticket.category))]
    pub async fn create(
        &self,
        user_id: UserId,
        ticket: &NewTicket<'_>,
    ) -> Result<Ticket, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(order_id) = ticket.order_id {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1 AND user_id = $2)",
            )
            .bind(order_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

            if !owned {
                return Err(RepositoryError::NotFound);
            }
        }

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(TICKET_NUMBER_LOCK)
            .execute(&mut *tx)
            .await?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM support_tickets")
            .fetch_one(&mut *tx)
            .await?;
        let ticket_number = TicketNumber::sequential(Utc::now().year(), existing);

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            INSERT INTO support_tickets
                (ticket_number, user_id, order_id, subject, description, status, priority, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(ticket_number.as_str())
        .bind(user_id)
        .bind(ticket.order_id)
        .bind(ticket.subject)
        .bind(ticket.description)
        .bind(TicketStatus::Open)
        .bind(ticket.priority)
        .bind(ticket.category)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(ticket_number = %row.ticket_number, "support ticket opened");

        Ok(row.into())
    }

    /// A ticket with its messages, oldest first. Pass `user_id` to require ownership.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_detail(
        &self,
        id: TicketId,
        user_id: Option<UserId>,
    ) -> Result<Option<TicketDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            SELECT {TICKET_COLUMNS}
            FROM support_tickets
            WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages = sqlx::query_as::<_, MessageRow>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM support_messages
            WHERE ticket_id = $1
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(TicketDetail {
            ticket: row.into(),
            messages: messages.into_iter().map(Into::into).collect(),
        }))
    }

    /// Add a customer message to their own ticket. A resolved ticket reopens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket isn't the user's.
    #[instrument(skip(self, message))]
    pub async fn add_message(
        &self,
        user_id: UserId,
        ticket_id: TicketId,
        message: &str,
    ) -> Result<TicketMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            r"
            UPDATE support_tickets
            SET status = CASE WHEN status = 'resolved' THEN 'open'::ticket_status ELSE status END,
                resolved_at = CASE WHEN status = 'resolved' THEN NULL ELSE resolved_at END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(ticket_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = insert_message(&mut tx, ticket_id, user_id, message, false).await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Add a staff reply. An open ticket moves to in progress.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket doesn't exist.
    #[instrument(skip(self, message))]
    pub async fn add_staff_reply(
        &self,
        staff_id: UserId,
        ticket_id: TicketId,
        message: &str,
    ) -> Result<TicketMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            r"
            UPDATE support_tickets
            SET status = CASE WHEN status = 'open' THEN 'in_progress'::ticket_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(ticket_id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = insert_message(&mut tx, ticket_id, staff_id, message, true).await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Change a ticket's status or priority.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket doesn't exist.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        ticket_id: TicketId,
        update: TicketUpdate,
    ) -> Result<Ticket, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            UPDATE support_tickets
            SET status = COALESCE($2, status),
                priority = COALESCE($3, priority),
                resolved_at = CASE
                    WHEN $2::ticket_status = 'resolved' AND status <> 'resolved' THEN NOW()
                    WHEN $2::ticket_status IN ('open', 'in_progress') THEN NULL
                    ELSE resolved_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(ticket_id)
        .bind(update.status)
        .bind(update.priority)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ticket_id: TicketId,
    user_id: UserId,
    message: &str,
    is_staff_reply: bool,
) -> Result<MessageRow, RepositoryError> {
    let row = sqlx::query_as::<_, MessageRow>(&format!(
        r"
        INSERT INTO support_messages (ticket_id, user_id, message, is_staff_reply)
        VALUES ($1, $2, $3, $4)
        RETURNING {MESSAGE_COLUMNS}
        "
    ))
    .bind(ticket_id)
    .bind(user_id)
    .bind(message)
    .bind(is_staff_reply)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}
