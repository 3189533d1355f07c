//! API token repository.
//!
//! Tokens are presented as `<id>|<secret>`. Only the SHA-256 hex digest of
//! the secret is stored, so a leaked table cannot be replayed.

use sqlx::PgPool;
use tracing::instrument;

use lumina_core::{ApiTokenId, UserId};

use super::RepositoryError;
use crate::models::User;

/// Repository for bearer token rows.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, token_hash))]
    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        token_hash: &str,
    ) -> Result<ApiTokenId, RepositoryError> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO api_tokens (user_id, name, token_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(name)
        .bind(token_hash)
        .fetch_one(self.pool)
        .await?;

        Ok(ApiTokenId::new(id))
    }

    /// Resolve a token to its owner and mark it as used.
    ///
    /// Returns `None` when the ID and hash don't match a stored token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, token_hash))]
    pub async fn authenticate(
        &self,
        id: ApiTokenId,
        token_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r"
            UPDATE api_tokens
            SET last_used_at = NOW()
            WHERE id = $1 AND token_hash = $2
            RETURNING user_id
            ",
        )
        .bind(id)
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        match user_id {
            Some(user_id) => {
                super::UserRepository::new(self.pool)
                    .get_by_id(UserId::new(user_id))
                    .await
            }
            None => Ok(None),
        }
    }

    /// Delete one token belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn revoke(&self, id: ApiTokenId, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
