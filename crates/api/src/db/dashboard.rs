//! Aggregate queries for the seller and admin dashboards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use gemvault_core::{GemStatus, OrderId, OrderStatus, Price, UserId, UserRole};

use super::RepositoryError;

/// Listing counts per moderation status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListingCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub sold_out: i64,
}

impl ListingCounts {
    fn from_rows(rows: &[(GemStatus, i64)]) -> Self {
        rows.iter().fold(Self::default(), |mut counts, &(status, n)| {
            match status {
                GemStatus::Pending => counts.pending += n,
                GemStatus::Approved => counts.approved += n,
                GemStatus::Rejected => counts.rejected += n,
                GemStatus::SoldOut => counts.sold_out += n,
            }
            counts
        })
    }
}

/// Account counts per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub buyer: i64,
    pub seller: i64,
    pub admin: i64,
    pub super_admin: i64,
}

impl UserCounts {
    fn from_rows(rows: &[(UserRole, i64)]) -> Self {
        rows.iter().fold(Self::default(), |mut counts, &(role, n)| {
            match role {
                UserRole::Buyer => counts.buyer += n,
                UserRole::Seller => counts.seller += n,
                UserRole::Admin => counts.admin += n,
                UserRole::SuperAdmin => counts.super_admin += n,
            }
            counts
        })
    }
}

/// Order counts keyed by status name, with every status present.
fn order_counts(rows: &[(OrderStatus, i64)]) -> BTreeMap<&'static str, i64> {
    let mut counts: BTreeMap<&'static str, i64> =
        OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for (status, n) in rows {
        *counts.entry(status.as_str()).or_insert(0) += n;
    }
    counts
}

/// One of the seller's recently ordered lines.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecentSale {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub gem_name: String,
    pub quantity: i32,
    pub unit_price: Price,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellerDashboard {
    pub listings: ListingCounts,
    pub units_sold: i64,
    pub revenue: Decimal,
    pub open_orders: i64,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub recent_orders: Vec<RecentSale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub users: UserCounts,
    pub sellers_pending_verification: i64,
    pub gems_pending_review: i64,
    pub orders: BTreeMap<&'static str, i64>,
    pub revenue: Decimal,
    pub orders_last_30_days: i64,
}

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Sales and listing figures for one seller. Cancelled orders are excluded from sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn seller(&self, seller_id: UserId) -> Result<SellerDashboard, RepositoryError> {
        let listing_rows: Vec<(GemStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM gems WHERE seller_id = $1 GROUP BY status")
                .bind(seller_id)
                .fetch_all(self.pool)
                .await?;

        let (units_sold, revenue): (i64, Decimal) = sqlx::query_as(
            r"
            SELECT COALESCE(SUM(oi.quantity), 0)::int8,
                   COALESCE(SUM(oi.quantity * oi.unit_price), 0)
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.seller_id = $1 AND o.status <> 'cancelled'
            ",
        )
        .bind(seller_id)
        .fetch_one(self.pool)
        .await?;

        let open_orders: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(DISTINCT o.id)
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            WHERE oi.seller_id = $1 AND o.status IN ('pending', 'confirmed', 'processing', 'shipped')
            ",
        )
        .bind(seller_id)
        .fetch_one(self.pool)
        .await?;

        let (average_rating, review_count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::float8, COUNT(*) FROM seller_reviews WHERE seller_id = $1",
        )
        .bind(seller_id)
        .fetch_one(self.pool)
        .await?;

        let recent_orders = sqlx::query_as::<_, RecentSale>(
            r"
            SELECT o.id AS order_id, o.status, oi.gem_name, oi.quantity, oi.unit_price, o.created_at
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.seller_id = $1
            ORDER BY o.created_at DESC, oi.id DESC
            LIMIT 5
            ",
        )
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        Ok(SellerDashboard {
            listings: ListingCounts::from_rows(&listing_rows),
            units_sold,
            revenue,
            open_orders,
            average_rating,
            review_count,
            recent_orders,
        })
    }

    /// Marketplace-wide moderation and sales figures.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn admin(&self) -> Result<AdminDashboard, RepositoryError> {
        let user_rows: Vec<(UserRole, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
                .fetch_all(self.pool)
                .await?;

        let sellers_pending_verification: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sellers WHERE verification_status = 'pending'",
        )
        .fetch_one(self.pool)
        .await?;

        let gems_pending_review: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM gems WHERE status = 'pending'")
                .fetch_one(self.pool)
                .await?;

        let order_rows: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let (revenue, orders_last_30_days): (Decimal, i64) = sqlx::query_as(
            r"
            SELECT COALESCE(SUM(total_amount) FILTER (WHERE status <> 'cancelled'), 0),
                   COUNT(*) FILTER (WHERE created_at >= NOW() - INTERVAL '30 days')
            FROM orders
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(AdminDashboard {
            users: UserCounts::from_rows(&user_rows),
            sellers_pending_verification,
            gems_pending_review,
            orders: order_counts(&order_rows),
            revenue,
            orders_last_30_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_counts_default_to_zero() {
        let counts = ListingCounts::from_rows(&[(GemStatus::Approved, 4), (GemStatus::SoldOut, 1)]);
        assert_eq!(
            counts,
            ListingCounts {
                pending: 0,
                approved: 4,
                rejected: 0,
                sold_out: 1,
            }
        );
    }

    #[test]
    fn test_user_counts() {
        let counts = UserCounts::from_rows(&[(UserRole::Buyer, 10), (UserRole::SuperAdmin, 1)]);
        assert_eq!(counts.buyer, 10);
        assert_eq!(counts.super_admin, 1);
        assert_eq!(counts.admin, 0);
    }

    #[test]
    fn test_order_counts_include_every_status() {
        let counts = order_counts(&[(OrderStatus::Shipped, 3)]);
        assert_eq!(counts.len(), OrderStatus::ALL.len());
        assert_eq!(counts["shipped"], 3);
        assert_eq!(counts["cancelled"], 0);
    }
}
