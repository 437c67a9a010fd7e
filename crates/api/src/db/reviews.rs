//! Seller review repository.

use sqlx::PgPool;

use gemvault_core::UserId;

use super::RepositoryError;
use crate::models::Review;

/// Repository for seller reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a seller, newest first, with the reviewer's first name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, seller_id: UserId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            r"
            SELECT r.id, r.seller_id, r.buyer_id, u.first_name AS reviewer_name,
                   r.rating, r.comment, r.created_at
            FROM seller_reviews r
            JOIN users u ON u.id = r.buyer_id
            WHERE r.seller_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Whether the buyer has a delivered order containing one of the seller's gems.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_purchase(
        &self,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let eligible: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM orders o
                JOIN order_items oi ON oi.order_id = o.id
                WHERE o.user_id = $1 AND oi.seller_id = $2 AND o.status = 'delivered'
            )
            ",
        )
        .bind(buyer_id)
        .bind(seller_id)
        .fetch_one(self.pool)
        .await?;
        Ok(eligible)
    }

    /// Store a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the buyer already reviewed this seller.
    /// Returns `RepositoryError::NotFound` if the seller does not exist.
    pub async fn create(
        &self,
        seller_id: UserId,
        buyer_id: UserId,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, Review>(
            r"
            WITH inserted AS (
                INSERT INTO seller_reviews (seller_id, buyer_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                RETURNING id, seller_id, buyer_id, rating, comment, created_at
            )
            SELECT i.id, i.seller_id, i.buyer_id, u.first_name AS reviewer_name,
                   i.rating, i.comment, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.buyer_id
            ",
        )
        .bind(seller_id)
        .bind(buyer_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound("seller");
            }
            RepositoryError::conflict_on_unique(e, "You have already reviewed this seller")
        })
    }
}
