//! Shipping address repository.
//!
//! A user has at most one default address. Every write that can change the
//! default runs in a transaction that clears the previous default first, and
//! the partial unique index `shipping_addresses_one_default_idx` backs it up.

use sqlx::{PgConnection, PgPool};

use gemvault_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

pub(crate) const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, address_line1, address_line2, \
     city, state, postal_code, country, is_default, created_at, updated_at";

/// Insert an address on an existing connection or transaction.
pub(crate) async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    input: &AddressInput,
    is_default: bool,
) -> Result<Address, RepositoryError> {
    let address = sqlx::query_as::<_, Address>(&format!(
        r"
        INSERT INTO shipping_addresses (user_id, full_name, phone, address_line1, address_line2,
                                        city, state, postal_code, country, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ADDRESS_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(input.full_name.trim())
    .bind(&input.phone)
    .bind(input.address_line1.trim())
    .bind(&input.address_line2)
    .bind(input.city.trim())
    .bind(&input.state)
    .bind(input.postal_code.trim())
    .bind(input.country.trim())
    .bind(is_default)
    .fetch_one(conn)
    .await?;
    Ok(address)
}

async fn clear_default(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE shipping_addresses SET is_default = FALSE WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Repository for shipping address operations, scoped to the owning user.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shipping_addresses WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shipping_addresses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(address)
    }

    /// Add an address. The first address, or one flagged default, becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shipping_addresses WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let is_default = existing == 0 || input.is_default;
        if is_default {
            clear_default(&mut *tx, user_id).await?;
        }
        let address = insert(&mut *tx, user_id, input, is_default).await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Replace an address's fields. `is_default: true` makes it the default;
    /// `false` leaves the default flag unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut *tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE shipping_addresses
            SET full_name = $3, phone = $4, address_line1 = $5, address_line2 = $6,
                city = $7, state = $8, postal_code = $9, country = $10,
                is_default = is_default OR $11, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.full_name.trim())
        .bind(&input.phone)
        .bind(input.address_line1.trim())
        .bind(&input.address_line2)
        .bind(input.city.trim())
        .bind(&input.state)
        .bind(input.postal_code.trim())
        .bind(input.country.trim())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("address"))?;

        tx.commit().await?;
        Ok(address)
    }

    /// Delete an address. If it was the default, the newest remaining address
    /// becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM shipping_addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("address"))?;

        if was_default {
            sqlx::query(
                r"
                UPDATE shipping_addresses SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM shipping_addresses
                    WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make an address the user's only default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        clear_default(&mut *tx, user_id).await?;

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE shipping_addresses SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("address"))?;

        tx.commit().await?;
        Ok(address)
    }
}
