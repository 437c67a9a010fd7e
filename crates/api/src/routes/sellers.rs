//! Public seller profiles and buyer reviews.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::UserId;

use crate::db::{ReviewRepository, SellerRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{PublicSellerProfile, Review};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

impl ReviewRequest {
    fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest("rating must be between 1 and 5".to_string()));
        }
        Ok(())
    }
}

/// A verified seller's storefront profile.
///
/// # Errors
///
/// 404 for unknown or unverified sellers.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PublicSellerProfile>> {
    let profile = SellerRepository::new(state.pool())
        .public_profile(UserId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Seller not found".to_string()))?;
    Ok(Json(profile))
}

/// Reviews of a seller, newest first.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Review>>> {
    Ok(Json(
        ReviewRepository::new(state.pool()).list(UserId::new(id)).await?,
    ))
}

/// Review a seller after a delivered purchase.
///
/// # Errors
///
/// 400 for a bad rating or a self-review, 403 without a delivered purchase,
/// 409 for a second review.
#[instrument(skip(state, body), fields(buyer_id = %user.id, seller_id = id))]
pub async fn create_review(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    body.validate()?;
    let seller_id = UserId::new(id);
    if seller_id == user.id {
        return Err(AppError::BadRequest("You cannot review yourself".to_string()));
    }

    let reviews = ReviewRepository::new(state.pool());
    if !reviews.has_delivered_purchase(user.id, seller_id).await? {
        return Err(AppError::Forbidden(
            "You can only review sellers you have received an order from".to_string(),
        ));
    }

    let comment = body
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let review = reviews
        .create(seller_id, user.id, body.rating, comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let request = |rating| ReviewRequest {
            rating,
            comment: None,
        };
        assert!(request(0).validate().is_err());
        assert!(request(1).validate().is_ok());
        assert!(request(5).validate().is_ok());
        assert!(request(6).validate().is_err());
    }
}
