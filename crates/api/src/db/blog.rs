//! Blog post repository.

use sqlx::{PgConnection, PgPool};

use gemvault_core::{BlogPostId, BlogStatus, Slug, UserId};

use super::{Pagination, RepositoryError};
use crate::models::{BlogPost, BlogPostSummary};

const POST_COLUMNS: &str = "id, author_id, title, slug, excerpt, content, cover_image, status, \
     published_at, created_at, updated_at";

const SUMMARY_COLUMNS: &str = "id, title, slug, excerpt, cover_image, status, published_at";

/// Fields for a new post.
#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub status: BlogStatus,
    pub cover_image: Option<String>,
}

/// Partial post update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct BlogPostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<BlogStatus>,
    pub cover_image: Option<String>,
}

/// First slug not in `taken`: the base itself, then `base-2`, `base-3`, ...
fn first_free_slug(base: &Slug, taken: &[String]) -> Slug {
    if !taken.iter().any(|s| s == base.as_str()) {
        return base.clone();
    }
    (2..)
        .map(|n| base.with_suffix(n))
        .find(|candidate| !taken.iter().any(|s| s == candidate.as_str()))
        .unwrap_or_else(|| base.clone())
}

async fn unique_slug(conn: &mut PgConnection, title: &str) -> Result<Slug, sqlx::Error> {
    let base = Slug::from_title(title);
    let taken: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM blog_posts WHERE slug = $1 OR slug LIKE $1 || '-%'")
            .bind(base.as_str())
            .fetch_all(conn)
            .await?;
    Ok(first_free_slug(&base, &taken))
}

/// Repository for blog posts.
pub struct BlogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BlogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Published posts, most recently published first, without bodies.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_published(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<BlogPostSummary>, i64), RepositoryError> {
        let posts = sqlx::query_as::<_, BlogPostSummary>(&format!(
            r"
            SELECT {SUMMARY_COLUMNS} FROM blog_posts
            WHERE status = 'published'
            ORDER BY published_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM blog_posts WHERE status = 'published'")
                .fetch_one(self.pool)
                .await?;

        Ok((posts, total))
    }

    /// A published post by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, RepositoryError> {
        let post = sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {POST_COLUMNS} FROM blog_posts WHERE slug = $1 AND status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(post)
    }

    /// All posts for admins, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, status: Option<BlogStatus>) -> Result<Vec<BlogPostSummary>, RepositoryError> {
        let posts = sqlx::query_as::<_, BlogPostSummary>(&format!(
            r"
            SELECT {SUMMARY_COLUMNS} FROM blog_posts
            WHERE ($1::blog_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(posts)
    }

    /// Get any post by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BlogPostId) -> Result<Option<BlogPost>, RepositoryError> {
        let post = sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {POST_COLUMNS} FROM blog_posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(post)
    }

    /// Create a post with a slug derived from its title.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a concurrent insert took the slug.
    pub async fn create(&self, author_id: UserId, post: &NewBlogPost) -> Result<BlogPost, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let slug = unique_slug(&mut *tx, &post.title).await?;

        let created = sqlx::query_as::<_, BlogPost>(&format!(
            r"
            INSERT INTO blog_posts (author_id, title, slug, excerpt, content, cover_image, status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    CASE WHEN $7 = 'published'::blog_status THEN NOW() END)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(author_id)
        .bind(&post.title)
        .bind(slug.as_str())
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.cover_image)
        .bind(post.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "A post with this slug already exists"))?;

        tx.commit().await?;
        Ok(created)
    }

    /// Update a post, returning it and the replaced cover image URL if the cover changed.
    ///
    /// The slug is kept so published links stay valid. `published_at` is set on
    /// the first transition to published and never cleared.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn update(
        &self,
        id: BlogPostId,
        update: &BlogPostUpdate,
    ) -> Result<(BlogPost, Option<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous_cover: Option<String> =
            sqlx::query_scalar("SELECT cover_image FROM blog_posts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound("blog post"))?;

        let post = sqlx::query_as::<_, BlogPost>(&format!(
            r"
            UPDATE blog_posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                excerpt = COALESCE($4, excerpt),
                status = COALESCE($5, status),
                cover_image = COALESCE($6, cover_image),
                published_at = COALESCE(
                    published_at,
                    CASE WHEN COALESCE($5, status) = 'published'::blog_status THEN NOW() END
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.content)
        .bind(&update.excerpt)
        .bind(update.status)
        .bind(&update.cover_image)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let replaced = update.cover_image.as_ref().and(previous_cover);
        Ok((post, replaced))
    }

    /// Delete a post, returning its cover image URL for cleanup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn delete(&self, id: BlogPostId) -> Result<Option<String>, RepositoryError> {
        let cover: Option<String> =
            sqlx::query_scalar("DELETE FROM blog_posts WHERE id = $1 RETURNING cover_image")
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or(RepositoryError::NotFound("blog post"))?;
        Ok(cover)
    }
}
