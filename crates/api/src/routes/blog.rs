//! Public blog handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::{BlogRepository, Pagination};
use crate::error::{AppError, Result};
use crate::models::{BlogPost, BlogPostSummary, Page};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Published posts, newest first.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<BlogPostSummary>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let (items, total) = BlogRepository::new(state.pool())
        .list_published(pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// A published post by slug, from the cache when warm.
///
/// # Errors
///
/// 404 for drafts, archived posts and unknown slugs.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>> {
    let post = state
        .blog_cache()
        .published(state.pool(), &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    Ok(Json(post))
}
