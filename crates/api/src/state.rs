//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::auth::JwtKeys;
use crate::services::blog_cache::BlogCache;
use crate::services::design::{DesignError, DesignStudio};
use crate::services::email::EmailService;
use crate::services::uploads::UploadStore;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
    #[error("design services: {0}")]
    Design(#[from] DesignError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    jwt: JwtKeys,
    email: Option<EmailService>,
    uploads: UploadStore,
    designs: DesignStudio,
    blog_cache: BlogCache,
}

impl AppState {
    /// Create the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport or an HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let jwt = JwtKeys::new(&config.jwt);
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        if email.is_none() {
            tracing::info!("SMTP not configured; password reset links will be logged");
        }
        let uploads = UploadStore::new(config.upload_dir.clone());
        let designs = DesignStudio::from_config(&config, &uploads)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                jwt,
                email,
                uploads,
                designs,
                blog_cache: BlogCache::default(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }

    /// The email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }

    #[must_use]
    pub fn designs(&self) -> &DesignStudio {
        &self.inner.designs
    }

    #[must_use]
    pub fn blog_cache(&self) -> &BlogCache {
        &self.inner.blog_cache
    }
}
