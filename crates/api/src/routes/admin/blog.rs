//! Blog management. Every write clears the published-post cache.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{BlogPostId, BlogStatus};

use crate::db::BlogRepository;
use crate::db::blog::{BlogPostUpdate, NewBlogPost};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{BlogPost, BlogPostSummary};
use crate::services::uploads::{MultipartForm, UploadField};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BlogListQuery {
    pub status: Option<BlogStatus>,
}

fn parse_status(form: &MultipartForm) -> Result<Option<BlogStatus>> {
    form.text("status")
        .map(str::parse::<BlogStatus>)
        .transpose()
        .map_err(AppError::BadRequest)
}

fn new_post(form: &MultipartForm) -> Result<NewBlogPost> {
    let (Some(title), Some(content)) = (form.text("title"), form.text("content")) else {
        return Err(AppError::BadRequest("title and content are required".to_string()));
    };
    Ok(NewBlogPost {
        title: title.to_owned(),
        content: content.to_owned(),
        excerpt: form.text("excerpt").map(str::to_owned),
        status: parse_status(form)?.unwrap_or_default(),
        cover_image: form.file(UploadField::CoverImage).map(str::to_owned),
    })
}

fn post_update(form: &MultipartForm) -> Result<BlogPostUpdate> {
    Ok(BlogPostUpdate {
        title: form.text("title").map(str::to_owned),
        content: form.text("content").map(str::to_owned),
        excerpt: form.text("excerpt").map(str::to_owned),
        status: parse_status(form)?,
        cover_image: form.file(UploadField::CoverImage).map(str::to_owned),
    })
}

/// All posts, any status.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<Vec<BlogPostSummary>>> {
    Ok(Json(BlogRepository::new(state.pool()).list(query.status).await?))
}

/// A post by id, any status.
///
/// # Errors
///
/// 404 for an unknown post.
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<BlogPost>> {
    let post = BlogRepository::new(state.pool())
        .get(BlogPostId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    Ok(Json(post))
}

/// Create a post from a multipart form with an optional cover image.
///
/// # Errors
///
/// 400 for a missing title or content or an unknown status.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BlogPost>)> {
    let uploads = state.uploads();
    let form = MultipartForm::read(multipart, uploads, &[UploadField::CoverImage]).await?;

    let created = match new_post(&form) {
        Ok(post) => BlogRepository::new(state.pool())
            .create(admin.id, &post)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };
    match created {
        Ok(post) => {
            state.blog_cache().invalidate_all();
            tracing::info!(post_id = %post.id, slug = %post.slug, "Blog post created");
            Ok((StatusCode::CREATED, Json(post)))
        }
        Err(e) => {
            uploads.discard(&form.all_files()).await;
            Err(e)
        }
    }
}

/// Update a post. A new cover image replaces the old file.
///
/// # Errors
///
/// 400 for an unknown status, 404 for an unknown post.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id, post_id = id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<BlogPost>> {
    let uploads = state.uploads();
    let form = MultipartForm::read(multipart, uploads, &[UploadField::CoverImage]).await?;

    let updated = match post_update(&form) {
        Ok(update) => BlogRepository::new(state.pool())
            .update(BlogPostId::new(id), &update)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };
    match updated {
        Ok((post, replaced)) => {
            if let Some(previous) = replaced {
                uploads.remove_url(&previous).await;
            }
            state.blog_cache().invalidate_all();
            Ok(Json(post))
        }
        Err(e) => {
            uploads.discard(&form.all_files()).await;
            Err(e)
        }
    }
}

/// Delete a post and its cover image.
///
/// # Errors
///
/// 404 for an unknown post.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let cover = BlogRepository::new(state.pool())
        .delete(BlogPostId::new(id))
        .await?;
    if let Some(cover) = cover {
        state.uploads().remove_url(&cover).await;
    }
    state.blog_cache().invalidate_all();
    tracing::info!(post_id = id, "Blog post deleted");
    Ok(StatusCode::NO_CONTENT)
}
