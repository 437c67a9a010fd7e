//! Seller profile repository.

use sqlx::PgPool;

use gemvault_core::{SellerVerification, UserId};

use super::RepositoryError;
use crate::models::{PublicSellerProfile, Seller, SellerWithOwner};

const SELLER_COLUMNS: &str = "s.user_id, s.business_name, s.business_description, \
     s.business_phone, s.business_address, s.profile_image, s.id_document, \
     s.verification_status, s.verification_notes, s.verified_at, s.created_at, s.updated_at";

/// Repository for seller profile operations.
pub struct SellerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SellerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a seller profile by its user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Option<Seller>, RepositoryError> {
        let seller = sqlx::query_as::<_, Seller>(&format!(
            "SELECT {SELLER_COLUMNS} FROM sellers s WHERE s.user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(seller)
    }

    /// Public profile with rating and listing counts. Only verified sellers are returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn public_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<PublicSellerProfile>, RepositoryError> {
        let profile = sqlx::query_as::<_, PublicSellerProfile>(
            r"
            SELECT s.user_id, s.business_name, s.business_description, s.profile_image,
                   s.verification_status, s.created_at AS member_since,
                   (SELECT AVG(r.rating)::float8 FROM seller_reviews r
                     WHERE r.seller_id = s.user_id) AS average_rating,
                   (SELECT COUNT(*) FROM seller_reviews r
                     WHERE r.seller_id = s.user_id) AS review_count,
                   (SELECT COUNT(*) FROM gems g
                     WHERE g.seller_id = s.user_id AND g.status = 'approved') AS listing_count
            FROM sellers s
            WHERE s.user_id = $1 AND s.verification_status = 'verified'
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(profile)
    }

    /// Update business details; `None` keeps the current value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no seller profile.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        business_name: Option<&str>,
        business_description: Option<&str>,
        business_phone: Option<&str>,
        business_address: Option<&str>,
    ) -> Result<Seller, RepositoryError> {
        let seller = sqlx::query_as::<_, Seller>(&format!(
            r"
            UPDATE sellers s
            SET business_name = COALESCE($2, s.business_name),
                business_description = COALESCE($3, s.business_description),
                business_phone = COALESCE($4, s.business_phone),
                business_address = COALESCE($5, s.business_address),
                updated_at = NOW()
            WHERE s.user_id = $1
            RETURNING {SELLER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(business_name)
        .bind(business_description)
        .bind(business_phone)
        .bind(business_address)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("seller profile"))?;
        Ok(seller)
    }

    /// Set the profile image, returning the updated profile and the previous image URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no seller profile.
    pub async fn set_profile_image(
        &self,
        user_id: UserId,
        url: &str,
    ) -> Result<(Seller, Option<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT profile_image FROM sellers WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("seller profile"))?;

        let seller = sqlx::query_as::<_, Seller>(&format!(
            "UPDATE sellers s SET profile_image = $2, updated_at = NOW() \
             WHERE s.user_id = $1 RETURNING {SELLER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((seller, previous))
    }

    /// Store an identity document. A rejected seller goes back to pending review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no seller profile.
    pub async fn set_id_document(
        &self,
        user_id: UserId,
        url: &str,
    ) -> Result<(Seller, Option<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT id_document FROM sellers WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound("seller profile"))?;

        let seller = sqlx::query_as::<_, Seller>(&format!(
            r"
            UPDATE sellers s
            SET id_document = $2,
                verification_status = CASE
                    WHEN s.verification_status = 'rejected' THEN 'pending'::seller_verification
                    ELSE s.verification_status
                END,
                updated_at = NOW()
            WHERE s.user_id = $1
            RETURNING {SELLER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((seller, previous))
    }

    /// List sellers with owner details, optionally filtered by verification status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<SellerVerification>,
    ) -> Result<Vec<SellerWithOwner>, RepositoryError> {
        let sellers = sqlx::query_as::<_, SellerWithOwner>(&format!(
            r"
            SELECT {SELLER_COLUMNS}, u.email, u.first_name, u.last_name
            FROM sellers s
            JOIN users u ON u.id = s.user_id
            WHERE ($1::seller_verification IS NULL OR s.verification_status = $1)
            ORDER BY s.created_at DESC
            "
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(sellers)
    }

    /// Record an admin verification decision.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no seller profile.
    pub async fn set_verification(
        &self,
        user_id: UserId,
        status: SellerVerification,
        notes: Option<&str>,
    ) -> Result<Seller, RepositoryError> {
        let seller = sqlx::query_as::<_, Seller>(&format!(
            r"
            UPDATE sellers s
            SET verification_status = $2,
                verification_notes = $3,
                verified_at = CASE WHEN $2 = 'verified'::seller_verification THEN NOW() ELSE NULL END,
                updated_at = NOW()
            WHERE s.user_id = $1
            RETURNING {SELLER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(status)
        .bind(notes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("seller profile"))?;
        Ok(seller)
    }
}
