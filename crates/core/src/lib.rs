//! Lumina Core - Shared domain types and checkout rules.
//!
//! This crate provides the types used across all Lumina components:
//! - `api` - REST/JSON backend
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types, pricing rules, and the pure checkout
//! planner - no I/O, no database access, no HTTP. The `postgres` feature adds
//! `sqlx` encode/decode implementations for the newtypes and enums.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, and statuses
//! - [`pricing`] - Tax, shipping and line-total arithmetic
//! - [`numbering`] - Human-facing order and ticket numbers
//! - [`checkout`] - Cart validation and order planning

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod numbering;
pub mod pricing;
pub mod types;

pub use checkout::{
    CartIssue, CartIssueKind, CartLine, CheckoutError, CheckoutPlan, PlannedItem, StockAdjustment,
    StockTarget, plan_checkout, restock_adjustments, validate_lines,
};
pub use numbering::{NumberingError, OrderNumber, TicketNumber};
pub use pricing::OrderTotals;
pub use types::*;
