//! Order oversight.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use gemvault_core::OrderStatus;

use crate::db::{OrderRepository, Pagination};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{OrderDetail, Page};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Every order, newest first, optionally by status.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Page<OrderDetail>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let (items, total) = OrderRepository::new(state.pool())
        .list_all(query.status, pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}
