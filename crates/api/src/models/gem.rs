//! Gem listing models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use gemvault_core::{GemId, GemImageId, GemStatus, Price, UserId};

/// Images a single listing may carry.
pub const MAX_GEM_IMAGES: usize = 8;

/// A gem listing row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Gem {
    pub id: GemId,
    pub seller_id: UserId,
    pub name: String,
    pub gem_type: String,
    pub description: Option<String>,
    pub price: Price,
    pub carat: Decimal,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub treatment: Option<String>,
    pub certificate_number: String,
    pub certificate_lab: Option<String>,
    pub certificate_file: Option<String>,
    pub stock_quantity: i32,
    pub status: GemStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GemImage {
    pub id: GemImageId,
    pub gem_id: GemId,
    pub image_url: String,
    pub is_primary: bool,
    pub sort_order: i32,
}

/// Catalog list entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GemSummary {
    pub id: GemId,
    pub seller_id: UserId,
    pub seller_name: String,
    pub name: String,
    pub gem_type: String,
    pub price: Price,
    pub carat: Decimal,
    pub color: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub stock_quantity: i32,
    pub status: GemStatus,
    pub primary_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A gem with its images and seller name.
#[derive(Debug, Clone, Serialize)]
pub struct GemDetail {
    #[serde(flatten)]
    pub gem: Gem,
    pub seller_name: String,
    pub images: Vec<GemImage>,
}

impl GemDetail {
    /// Whether `viewer` may see this listing while it is not public.
    #[must_use]
    pub fn visible_to(&self, viewer: Option<&super::CurrentUser>) -> bool {
        self.gem.status.is_public()
            || viewer.is_some_and(|u| u.is_admin() || u.id == self.gem.seller_id)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GemTypeCount {
    pub gem_type: String,
    pub count: i64,
}
