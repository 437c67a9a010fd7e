//! The signed-in seller's own profile, documents, listings and dashboard.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Deserialize;

use crate::db::dashboard::SellerDashboard;
use crate::db::{DashboardRepository, GemRepository, SellerRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireSeller;
use crate::models::{GemSummary, Seller};
use crate::services::uploads::{MultipartForm, UploadField};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub business_name: Option<String>,
    pub business_description: Option<String>,
    pub business_phone: Option<String>,
    pub business_address: Option<String>,
}

/// The seller's profile.
///
/// # Errors
///
/// 404 if the seller profile is missing.
pub async fn profile(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
) -> Result<Json<Seller>> {
    let profile = SellerRepository::new(state.pool())
        .get(seller.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Seller profile not found".to_string()))?;
    Ok(Json(profile))
}

/// Update business details.
///
/// # Errors
///
/// 400 when the business name is blanked.
pub async fn update_profile(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Seller>> {
    if body
        .business_name
        .as_deref()
        .is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::BadRequest("business_name cannot be empty".to_string()));
    }

    let profile = SellerRepository::new(state.pool())
        .update_profile(
            seller.id,
            body.business_name.as_deref().map(str::trim),
            body.business_description.as_deref(),
            body.business_phone.as_deref(),
            body.business_address.as_deref(),
        )
        .await?;
    Ok(Json(profile))
}

/// Read a single-file upload and hand the stored URL to `apply`. The replaced
/// file is removed on success; the new one on failure.
async fn replace_file<F, Fut>(
    state: &AppState,
    multipart: Multipart,
    field: UploadField,
    apply: F,
) -> Result<Seller>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = std::result::Result<(Seller, Option<String>), crate::db::RepositoryError>>,
{
    let uploads = state.uploads();
    let form = MultipartForm::read(multipart, uploads, &[field]).await?;
    let url = form
        .file(field)
        .map(str::to_owned)
        .ok_or_else(|| AppError::BadRequest(format!("{} file is required", field.name())))?;

    match apply(url.clone()).await {
        Ok((seller, previous)) => {
            if let Some(previous) = previous {
                uploads.remove_url(&previous).await;
            }
            Ok(seller)
        }
        Err(e) => {
            uploads.remove_url(&url).await;
            Err(e.into())
        }
    }
}

/// Upload a profile image.
///
/// # Errors
///
/// 400 without a valid image.
pub async fn upload_profile_image(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Seller>> {
    let sellers = SellerRepository::new(state.pool());
    let profile = replace_file(&state, multipart, UploadField::ProfileImage, |url| async move {
        sellers.set_profile_image(seller.id, &url).await
    })
    .await?;
    Ok(Json(profile))
}

/// Upload an identity document. A rejected seller returns to pending review.
///
/// # Errors
///
/// 400 without a valid document.
pub async fn upload_verification_document(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Seller>> {
    let sellers = SellerRepository::new(state.pool());
    let profile = replace_file(&state, multipart, UploadField::IdDocument, |url| async move {
        sellers.set_id_document(seller.id, &url).await
    })
    .await?;
    tracing::info!(seller_id = %seller.id, status = %profile.verification_status, "Verification document uploaded");
    Ok(Json(profile))
}

/// All of the seller's listings, any status.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn gems(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
) -> Result<Json<Vec<GemSummary>>> {
    Ok(Json(
        GemRepository::new(state.pool()).list_by_seller(seller.id).await?,
    ))
}

/// Sales and listing figures.
///
/// # Errors
///
/// 500 if a query fails.
pub async fn dashboard(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
) -> Result<Json<SellerDashboard>> {
    Ok(Json(
        DashboardRepository::new(state.pool()).seller(seller.id).await?,
    ))
}
