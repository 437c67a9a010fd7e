//! Blog post models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gemvault_core::{BlogPostId, BlogStatus, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub author_id: Option<UserId>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub status: BlogStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List entry without the post body.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlogPostSummary {
    pub id: BlogPostId,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: BlogStatus,
    pub published_at: Option<DateTime<Utc>>,
}
