//! In-process cache of published blog posts, keyed by slug.
//!
//! Entries live for 5 minutes; admin writes invalidate everything.

use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{BlogRepository, RepositoryError};
use crate::models::BlogPost;

#[derive(Clone)]
pub struct BlogCache {
    posts: Cache<String, BlogPost>,
}

impl Default for BlogCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl BlogCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            posts: Cache::builder().max_capacity(500).time_to_live(ttl).build(),
        }
    }

    /// A published post by slug, loading it from the database on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the lookup fails.
    pub async fn published(
        &self,
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<BlogPost>, RepositoryError> {
        if let Some(post) = self.posts.get(slug).await {
            debug!(slug, "Cache hit for blog post");
            return Ok(Some(post));
        }

        let post = BlogRepository::new(pool).get_published_by_slug(slug).await?;
        if let Some(post) = &post {
            self.posts.insert(slug.to_owned(), post.clone()).await;
        }
        Ok(post)
    }

    pub fn invalidate_all(&self) {
        self.posts.invalidate_all();
    }
}

impl std::fmt::Debug for BlogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogCache")
            .field("entries", &self.posts.entry_count())
            .finish()
    }
}
