//! Listing moderation.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{GemId, GemStatus};

use crate::db::GemRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Gem, GemSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GemQueueQuery {
    pub status: Option<GemStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: GemStatus,
    pub reason: Option<String>,
}

impl ReviewRequest {
    /// The decision and its reason, once validated.
    fn decision(&self) -> Result<(GemStatus, Option<&str>)> {
        let reason = self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        match self.status {
            GemStatus::Approved => Ok((GemStatus::Approved, None)),
            GemStatus::Rejected => reason
                .map(|r| (GemStatus::Rejected, Some(r)))
                .ok_or_else(|| AppError::BadRequest("A rejection reason is required".to_string())),
            _ => Err(AppError::BadRequest(
                "status must be approved or rejected".to_string(),
            )),
        }
    }
}

/// Listings in a status, oldest first. Defaults to the pending queue.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<GemQueueQuery>,
) -> Result<Json<Vec<GemSummary>>> {
    let status = query.status.unwrap_or(GemStatus::Pending);
    Ok(Json(
        GemRepository::new(state.pool()).list_by_status(status).await?,
    ))
}

/// Approve or reject a listing.
///
/// # Errors
///
/// 400 for another status or a rejection without reason, 404 for an unknown gem.
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn review(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Gem>> {
    let (status, reason) = body.decision()?;
    let gem = GemRepository::new(state.pool())
        .review(GemId::new(id), status, reason)
        .await?;
    tracing::info!(gem_id = id, status = %gem.status, "Gem reviewed");
    Ok(Json(gem))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: GemStatus, reason: Option<&str>) -> ReviewRequest {
        ReviewRequest {
            status,
            reason: reason.map(str::to_owned),
        }
    }

    #[test]
    fn test_rejection_requires_reason() {
        assert!(request(GemStatus::Rejected, None).decision().is_err());
        assert!(request(GemStatus::Rejected, Some("  ")).decision().is_err());
        assert!(matches!(
            request(GemStatus::Rejected, Some("Blurry photos")).decision(),
            Ok((GemStatus::Rejected, Some("Blurry photos")))
        ));
    }

    #[test]
    fn test_approval_drops_reason() {
        assert!(matches!(
            request(GemStatus::Approved, Some("looks good")).decision(),
            Ok((GemStatus::Approved, None))
        ));
    }

    #[test]
    fn test_only_review_outcomes_allowed() {
        assert!(request(GemStatus::SoldOut, None).decision().is_err());
        assert!(request(GemStatus::Pending, None).decision().is_err());
    }
}
