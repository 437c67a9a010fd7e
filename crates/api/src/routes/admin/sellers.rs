//! Seller verification.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{SellerVerification, UserId};

use crate::db::SellerRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Seller, SellerWithOwner};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SellerListQuery {
    pub status: Option<SellerVerification>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub status: SellerVerification,
    pub notes: Option<String>,
}

/// Sellers with their owners' contact details.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<SellerListQuery>,
) -> Result<Json<Vec<SellerWithOwner>>> {
    Ok(Json(
        SellerRepository::new(state.pool()).list(query.status).await?,
    ))
}

/// Verify, reject or suspend a seller.
///
/// # Errors
///
/// 404 for an unknown seller.
#[instrument(skip(state, body), fields(admin_id = %admin.id, status = %body.status))]
pub async fn set_verification(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(body): Json<VerificationRequest>,
) -> Result<Json<Seller>> {
    let notes = body.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let seller = SellerRepository::new(state.pool())
        .set_verification(UserId::new(user_id), body.status, notes)
        .await?;
    tracing::info!(seller_id = user_id, "Seller verification changed");
    Ok(Json(seller))
}
