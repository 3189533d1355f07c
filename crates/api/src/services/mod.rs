//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, bearer tokens, password changes

pub mod auth;
