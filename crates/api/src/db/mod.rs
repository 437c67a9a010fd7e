//! Database operations for the marketplace `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `sellers`, `password_resets` - Accounts and seller profiles
//! - `gems`, `gem_images` - Listings
//! - `carts`, `cart_items` - One cart per user
//! - `orders`, `order_items`, `order_status_history` - Checkout and fulfilment
//! - `shipping_addresses` - Saved addresses (one default per user)
//! - `seller_reviews` - Buyer ratings of sellers
//! - `blog_posts` - Editorial content
//! - `jewelry_designs` - AI-assisted designs (JSONB images/refinements/materials)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p gemvault-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database.

pub mod addresses;
pub mod blog;
pub mod carts;
pub mod dashboard;
pub mod designs;
pub mod gems;
pub mod orders;
pub mod password_resets;
pub mod reviews;
pub mod sellers;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use blog::BlogRepository;
pub use carts::CartRepository;
pub use dashboard::DashboardRepository;
pub use designs::DesignRepository;
pub use gems::GemRepository;
pub use orders::OrderRepository;
pub use password_resets::PasswordResetRepository;
pub use reviews::ReviewRepository;
pub use sellers::SellerRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),

    /// A business rule checked inside a transaction rejected the operation.
    #[error("{0}")]
    Invalid(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, keeping other errors.
    pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_string());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Validated page/per-page pair for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PER_PAGE: i64 = 100;

    /// Clamp raw query values: page starts at 1, per-page is 1..=100.
    #[must_use]
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Row offset for `OFFSET`.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let p = Pagination::new(None, None);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 20);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 100);

        let p = Pagination::new(Some(-3), Some(0));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);
    }

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::new(Some(3), Some(25));
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_repository_error_messages() {
        assert_eq!(RepositoryError::NotFound("gem").to_string(), "gem not found");
        assert_eq!(
            RepositoryError::Conflict("email taken".to_string()).to_string(),
            "email taken"
        );
    }
}
