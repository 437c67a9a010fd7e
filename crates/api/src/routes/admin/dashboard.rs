//! Marketplace-wide figures for admins.

use axum::{Json, extract::State};

use crate::db::DashboardRepository;
use crate::db::dashboard::AdminDashboard;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// User, listing and order counts plus revenue.
///
/// # Errors
///
/// 500 if a query fails.
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>> {
    Ok(Json(DashboardRepository::new(state.pool()).admin().await?))
}
