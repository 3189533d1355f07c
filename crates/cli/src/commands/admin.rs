//! Staff account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user
//! lumina admin create -e admin@example.com -n "Admin Name" -r super_admin -p 'S3cret-pass'
//!
//! # Promote (or demote) an existing account
//! lumina admin promote -e someone@example.com -r admin
//! ```

use lumina_api::db::UserRepository;
use lumina_api::services::auth::{AuthError, AuthService};
use lumina_core::{Email, UserId, UserRole};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: {1}")]
    InvalidRole(String, &'static str),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No user with email: {0}")]
    UserNotFound(String),

    /// Account creation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] lumina_api::db::RepositoryError),
}

/// Parse a role accepted for a new staff account.
fn staff_role(role: &str) -> Result<UserRole, AdminError> {
    role.parse::<UserRole>()
        .ok()
        .filter(|r| r.is_admin())
        .ok_or_else(|| AdminError::InvalidRole(role.to_owned(), "super_admin, admin"))
}

/// Create a new admin user.
///
/// # Errors
///
/// Returns an error for an invalid role or email, a weak password, an email
/// that is already registered, or a database failure.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: &str,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let role = staff_role(role)?;
    let pool = super::connect().await?;

    tracing::info!("Creating admin user: {} ({})", email, role);

    let user = AuthService::new(&pool)
        .create_account(name, email, password, None, None, role)
        .await
        .map_err(AdminError::from)?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id)
}

/// Change the role of an existing user.
///
/// # Errors
///
/// Returns an error for an unknown role or email, or a database failure.
pub async fn promote(email: &str, role: &str) -> Result<(), Box<dyn std::error::Error>> {
    let role: UserRole = role.parse().map_err(|_| {
        AdminError::InvalidRole(role.to_owned(), "customer, admin, super_admin")
    })?;
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = super::connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await
        .map_err(AdminError::from)?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    let updated = users
        .update_role(user.id, role)
        .await
        .map_err(AdminError::from)?;

    tracing::info!(
        "Role updated: {} is now {} (was {})",
        updated.email,
        updated.role,
        user.role
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_role() {
        assert_eq!(staff_role("admin").ok(), Some(UserRole::Admin));
        assert_eq!(staff_role("super_admin").ok(), Some(UserRole::SuperAdmin));
        assert!(matches!(
            staff_role("customer"),
            Err(AdminError::InvalidRole(_, _))
        ));
        assert!(staff_role("owner").is_err());
    }
}
