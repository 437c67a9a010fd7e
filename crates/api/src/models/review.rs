//! Seller review model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gemvault_core::{ReviewId, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub reviewer_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
