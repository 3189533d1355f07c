//! Support ticket lifecycle against a real database.
//!
//! These tests require a `PostgreSQL` database at `TEST_DATABASE_URL`.
//!
//! Run with: cargo test -p lumina-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use lumina_api::db::support::{NewTicket, TicketUpdate};
use lumina_api::db::{RepositoryError, SupportRepository};
use lumina_core::{OrderId, TicketCategory, TicketPriority, TicketStatus};
use lumina_integration_tests::TestDb;

fn ticket(order_id: Option<OrderId>) -> NewTicket<'static> {
    NewTicket {
        subject: "Damaged bottle",
        description: "The serum arrived with a cracked cap.",
        priority: TicketPriority::High,
        category: TicketCategory::Order,
        order_id,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_ticket_conversation_and_status_changes() {
    let db = TestDb::connect().await.unwrap();
    let (customer, _) = db.customer().await.unwrap();
    let (staff, _) = db.customer().await.unwrap();

    let support = SupportRepository::new(&db.pool);
    let opened = support.create(customer.id, &ticket(None)).await.unwrap();
    assert!(opened.ticket_number.starts_with("TKT-"));
    assert_eq!(opened.status, TicketStatus::Open);

    support
        .add_staff_reply(staff.id, opened.id, "Sorry about that, a replacement is on its way.")
        .await
        .unwrap();

    let detail = support
        .get_detail(opened.id, Some(customer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.ticket.status, TicketStatus::InProgress);
    assert_eq!(detail.messages.len(), 1);
    assert!(detail.messages[0].is_staff_reply);

    let resolved = support
        .update(
            opened.id,
            TicketUpdate {
                status: Some(TicketStatus::Resolved),
                priority: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, TicketStatus::Resolved);
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.priority, TicketPriority::High);

    // A customer follow-up reopens a resolved ticket.
    support
        .add_message(customer.id, opened.id, "The replacement leaks too.")
        .await
        .unwrap();
    let detail = support.get_detail(opened.id, None).await.unwrap().unwrap();
    assert_eq!(detail.ticket.status, TicketStatus::Open);
    assert!(detail.ticket.resolved_at.is_none());
    assert_eq!(detail.messages.len(), 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_tickets_are_private_to_their_owner() {
    let db = TestDb::connect().await.unwrap();
    let (owner, _) = db.customer().await.unwrap();
    let (other, _) = db.customer().await.unwrap();

    let support = SupportRepository::new(&db.pool);
    let opened = support.create(owner.id, &ticket(None)).await.unwrap();

    let hidden = support.get_detail(opened.id, Some(other.id)).await.unwrap();
    assert!(hidden.is_none());

    let result = support.add_message(other.id, opened.id, "Me too").await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn test_ticket_cannot_reference_someone_elses_order() {
    let db = TestDb::connect().await.unwrap();
    let (customer, _) = db.customer().await.unwrap();

    let support = SupportRepository::new(&db.pool);
    let result = support
        .create(customer.id, &ticket(Some(OrderId::new(i64::MAX))))
        .await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}
