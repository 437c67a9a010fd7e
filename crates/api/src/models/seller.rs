//! Seller profile models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gemvault_core::{SellerVerification, UserId};

/// Seller profile as seen by the seller and admins.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Seller {
    pub user_id: UserId,
    pub business_name: String,
    pub business_description: Option<String>,
    pub business_phone: Option<String>,
    pub business_address: Option<String>,
    pub profile_image: Option<String>,
    pub id_document: Option<String>,
    pub verification_status: SellerVerification,
    pub verification_notes: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public storefront view of a verified seller.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicSellerProfile {
    pub user_id: UserId,
    pub business_name: String,
    pub business_description: Option<String>,
    pub profile_image: Option<String>,
    pub verification_status: SellerVerification,
    pub member_since: DateTime<Utc>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub listing_count: i64,
}

/// Admin list entry: the seller profile with its owner's contact details.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SellerWithOwner {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub seller: Seller,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}
