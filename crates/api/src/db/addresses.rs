//! Address repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lumina_core::{AddressId, AddressType, UserId};

use super::{RepositoryError, map_constraint};
use crate::models::Address;

const ADDRESS_COLUMNS: &str = "id, user_id, address_type, first_name, last_name, company, \
     address_line_1, address_line_2, city, state, postal_code, country, phone, is_default, \
     created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i64,
    user_id: i64,
    address_type: AddressType,
    first_name: String,
    last_name: String,
    company: Option<String>,
    address_line_1: String,
    address_line_2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    phone: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            address_type: row.address_type,
            first_name: row.first_name,
            last_name: row.last_name,
            company: row.company,
            address_line_1: row.address_line_1,
            address_line_2: row.address_line_2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            phone: row.phone,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Address fields as submitted by the user.
#[derive(Debug, Clone)]
pub struct AddressInput {
    pub address_type: AddressType,
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
}

/// Repository for user addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's addresses, defaults first then newest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS}
            FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an address by ID without an ownership check (order detail).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create an address. A new default clears other defaults of the same type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, input), fields(address_type = ?input.address_type))]
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_defaults(&mut tx, user_id, input.address_type).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO addresses
                (user_id, address_type, first_name, last_name, company, address_line_1,
                 address_line_2, city, state, postal_code, country, phone, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.address_type)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.company)
        .bind(&input.address_line_1)
        .bind(&input.address_line_2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Replace an address owned by the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the user's.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_defaults(&mut tx, user_id, input.address_type).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE addresses
            SET address_type = $3, first_name = $4, last_name = $5, company = $6,
                address_line_1 = $7, address_line_2 = $8, city = $9, state = $10,
                postal_code = $11, country = $12, phone = $13, is_default = $14,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.address_type)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.company)
        .bind(&input.address_line_1)
        .bind(&input.address_line_2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Delete an address owned by the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the user's.
    /// Returns `RepositoryError::Conflict` if an order references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| map_constraint(e, "address is used by an order"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn clear_defaults(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
    address_type: AddressType,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE addresses
        SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND address_type = $2 AND is_default
        ",
    )
    .bind(user_id)
    .bind(address_type)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
