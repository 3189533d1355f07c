//! Authentication service.
//!
//! Password accounts with opaque bearer tokens. A token is presented as
//! `<id>|<secret>`; the row ID locates it and the SHA-256 of the secret must
//! match the stored hash.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::instrument;

use lumina_core::{ApiTokenId, Email, SkinType, UserId, UserRole};

use crate::db::users::{NewUser, UserRepository};
use crate::db::{RepositoryError, TokenRepository};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Length of the random part of a bearer token.
const TOKEN_SECRET_LENGTH: usize = 40;

/// Token name used when the client doesn't send a device name.
pub const DEFAULT_TOKEN_NAME: &str = "API Token";

/// A freshly issued bearer token. The plain text is only available here.
pub struct IssuedToken {
    pub id: ApiTokenId,
    pub plain_text: String,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("id", &self.id)
            .field("plain_text", &"[REDACTED]")
            .finish()
    }
}

/// Account fields for self-registration.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub phone: Option<&'a str>,
    pub skin_type: Option<SkinType>,
    pub device_name: Option<&'a str>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: TokenRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens: TokenRepository::new(pool),
        }
    }

    /// Register a customer account and issue its first token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(
        &self,
        registration: &Registration<'_>,
    ) -> Result<(User, IssuedToken), AuthError> {
        let user = self
            .create_account(
                registration.name,
                registration.email,
                registration.password,
                registration.phone,
                registration.skin_type,
                UserRole::Customer,
            )
            .await?;

        let token = self
            .issue_token(user.id, registration.device_name.unwrap_or(DEFAULT_TOKEN_NAME))
            .await?;

        tracing::info!(user_id = %user.id, "user registered");

        Ok((user, token))
    }

    /// Create an account with an explicit role, without issuing a token.
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::register`].
    #[instrument(skip(self, password))]
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
        skin_type: Option<SkinType>,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(&NewUser {
                name,
                email: &email,
                password_hash: &password_hash,
                phone,
                skin_type,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account is inactive.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_name: Option<&str>,
    ) -> Result<(User, IssuedToken), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let token = self
            .issue_token(user.id, device_name.unwrap_or(DEFAULT_TOKEN_NAME))
            .await?;

        Ok((user, token))
    }

    /// Resolve a presented bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed or unknown.
    /// Returns `AuthError::AccountDisabled` if the owner is inactive.
    pub async fn authenticate(&self, bearer: &str) -> Result<(User, ApiTokenId), AuthError> {
        let (id, secret) = parse_token(bearer).ok_or(AuthError::InvalidToken)?;

        let user = self
            .tokens
            .authenticate(id, &hash_token(secret))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok((user, id))
    }

    /// Revoke the token used for the current request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    #[instrument(skip(self))]
    pub async fn logout(&self, token_id: ApiTokenId, user_id: UserId) -> Result<(), AuthError> {
        self.tokens.revoke(token_id, user_id).await?;
        Ok(())
    }

    /// Change the password, revoking every token and issuing a new one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectCurrentPassword` if `current` doesn't match.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<IssuedToken, AuthError> {
        let stored = self.users.get_password_hash(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })?;

        verify_password(current, &stored).map_err(|_| AuthError::IncorrectCurrentPassword)?;
        validate_password(new)?;

        let password_hash = hash_password(new)?;
        let secret = generate_secret();
        let id = self
            .users
            .change_password(user_id, &password_hash, DEFAULT_TOKEN_NAME, &hash_token(&secret))
            .await?;

        tracing::info!(user_id = %user_id, "password changed, tokens rotated");

        Ok(IssuedToken {
            id,
            plain_text: format!("{id}|{secret}"),
        })
    }

    async fn issue_token(&self, user_id: UserId, name: &str) -> Result<IssuedToken, AuthError> {
        let secret = generate_secret();
        let id = self.tokens.create(user_id, name, &hash_token(&secret)).await?;

        Ok(IssuedToken {
            id,
            plain_text: format!("{id}|{secret}"),
        })
    }
}

/// Random alphanumeric token secret.
fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest stored in place of the token secret.
#[must_use]
pub fn hash_token(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Split `<id>|<secret>` into its parts.
#[must_use]
pub fn parse_token(bearer: &str) -> Option<(ApiTokenId, &str)> {
    let (id, secret) = bearer.split_once('|')?;
    let id = id.parse::<i64>().ok()?;
    if secret.is_empty() {
        return None;
    }
    Some((ApiTokenId::new(id), secret))
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` naming the first rule broken.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "The password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    if !password.chars().any(char::is_uppercase) || !password.chars().any(char::is_lowercase) {
        return Err(AuthError::WeakPassword(
            "The password must contain at least one uppercase and one lowercase letter."
                .to_owned(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "The password must contain at least one number.".to_owned(),
        ));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(validate_password("Secret123").is_ok());
        assert!(matches!(
            validate_password("Sh0rt"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("Secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret123", &hash).is_ok());
        assert!(matches!(
            verify_password("Secret124", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("Secret123", "not-a-hash").is_err());
    }

    #[test]
    fn test_token_hash_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generated_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), TOKEN_SECRET_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_parse_token() {
        let (id, secret) = parse_token("42|abcDEF123").unwrap();
        assert_eq!(id, ApiTokenId::new(42));
        assert_eq!(secret, "abcDEF123");

        assert!(parse_token("abcDEF123").is_none());
        assert!(parse_token("x|abc").is_none());
        assert!(parse_token("42|").is_none());
    }

    #[test]
    fn test_issued_token_debug_redacts_secret() {
        let token = IssuedToken {
            id: ApiTokenId::new(7),
            plain_text: "7|supersecret".to_owned(),
        };
        let debug = format!("{token:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("REDACTED"));
    }
}
