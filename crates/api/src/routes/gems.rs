//! Gem catalog and listing management handlers.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{GemId, GemImageId, Price, UserId};

use crate::db::gems::{GemSearch, GemSort, GemUpdate, NewGem};
use crate::db::{GemRepository, Pagination, SellerRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth, RequireSeller};
use crate::models::{CurrentUser, Gem, GemDetail, GemImage, GemSummary, GemTypeCount, Page};
use crate::services::uploads::{MultipartForm, UploadField};
use crate::state::AppState;

/// Catalog query string.
#[derive(Debug, Default, Deserialize)]
pub struct GemListQuery {
    pub q: Option<String>,
    pub gem_type: Option<String>,
    pub color: Option<String>,
    pub shape: Option<String>,
    pub origin: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_carat: Option<Decimal>,
    pub max_carat: Option<Decimal>,
    pub seller_id: Option<i32>,
    pub sort: Option<GemSort>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl GemListQuery {
    fn into_search(self) -> (GemSearch, Pagination) {
        let pagination = Pagination::new(self.page, self.per_page);
        let search = GemSearch {
            q: non_blank(self.q),
            gem_type: non_blank(self.gem_type),
            color: non_blank(self.color),
            shape: non_blank(self.shape),
            origin: non_blank(self.origin),
            min_price: self.min_price,
            max_price: self.max_price,
            min_carat: self.min_carat,
            max_carat: self.max_carat,
            seller_id: self.seller_id.map(UserId::new),
            sort: self.sort.unwrap_or_default(),
        };
        (search, pagination)
    }
}

/// Browse approved gems.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<GemListQuery>,
) -> Result<Json<Page<GemSummary>>> {
    let (search, pagination) = query.into_search();
    let (items, total) = GemRepository::new(state.pool())
        .search(&search, pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// Gem types in the public catalog with counts.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn types(State(state): State<AppState>) -> Result<Json<Vec<GemTypeCount>>> {
    Ok(Json(GemRepository::new(state.pool()).types().await?))
}

/// A single gem. Unapproved gems are only shown to their seller and admins.
///
/// # Errors
///
/// 404 when missing or not visible to the caller.
pub async fn show(
    OptionalAuth(viewer): OptionalAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<GemDetail>> {
    let detail = GemRepository::new(state.pool())
        .get_detail(GemId::new(id))
        .await?
        .filter(|d| d.visible_to(viewer.as_ref()))
        .ok_or_else(|| AppError::NotFound("Gem not found".to_string()))?;
    Ok(Json(detail))
}

/// Build a listing from multipart text fields.
fn new_gem_from_fields<'a>(
    text: impl Fn(&str) -> Option<&'a str>,
    certificate_file: Option<String>,
) -> Result<NewGem> {
    let required = |name: &str| {
        text(name).ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
    };
    let optional = |name: &str| text(name).map(str::to_owned);

    let name = required("name")?.to_owned();
    let gem_type = required("gem_type")?.to_owned();
    let certificate_number = required("certificate_number")?.to_owned();
    let price = Price::parse(required("price")?)
        .map_err(|e| AppError::BadRequest(format!("price: {e}")))?;
    let carat: Decimal = required("carat")?
        .parse()
        .map_err(|_| AppError::BadRequest("carat must be a number".to_string()))?;
    validate_carat(carat)?;
    let stock_quantity = match text("stock_quantity") {
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| AppError::BadRequest("stock_quantity must be an integer".to_string()))?,
        None => 1,
    };
    validate_stock(stock_quantity)?;

    Ok(NewGem {
        name,
        gem_type,
        description: optional("description"),
        price,
        carat,
        color: optional("color"),
        clarity: optional("clarity"),
        cut: optional("cut"),
        shape: optional("shape"),
        origin: optional("origin"),
        treatment: optional("treatment"),
        certificate_number,
        certificate_lab: optional("certificate_lab"),
        certificate_file,
        stock_quantity,
    })
}

fn validate_carat(carat: Decimal) -> Result<()> {
    if carat <= Decimal::ZERO {
        return Err(AppError::BadRequest("carat must be greater than 0".to_string()));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<()> {
    if stock < 0 {
        return Err(AppError::BadRequest("stock_quantity cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_update(update: &GemUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    for (name, value) in [
        ("name", &update.name),
        ("gem_type", &update.gem_type),
        ("certificate_number", &update.certificate_number),
    ] {
        if blank(value) {
            return Err(AppError::BadRequest(format!("{name} cannot be empty")));
        }
    }
    if let Some(carat) = update.carat {
        validate_carat(carat)?;
    }
    if let Some(stock) = update.stock_quantity {
        validate_stock(stock)?;
    }
    Ok(())
}

/// Load a gem the caller owns.
async fn owned_gem(state: &AppState, user: &CurrentUser, id: GemId) -> Result<Gem> {
    let gem = GemRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gem not found".to_string()))?;
    if gem.seller_id != user.id {
        return Err(AppError::Forbidden("You can only manage your own gems".to_string()));
    }
    Ok(gem)
}

async fn insert_listing(
    state: &AppState,
    seller: &CurrentUser,
    form: &MultipartForm,
) -> Result<GemDetail> {
    let images = form.files(UploadField::Images);
    if images.is_empty() {
        return Err(AppError::BadRequest("At least one image is required".to_string()));
    }
    let new_gem = new_gem_from_fields(
        |name| form.text(name),
        form.file(UploadField::Certificate).map(str::to_owned),
    )?;
    Ok(GemRepository::new(state.pool())
        .create(seller.id, &new_gem, images)
        .await?)
}

/// Create a listing with images and an optional certificate.
///
/// # Errors
///
/// 403 for unverified sellers, 400 for invalid fields or files, 409 for a
/// duplicate certificate number.
#[instrument(skip(state, multipart), fields(seller_id = %seller.id))]
pub async fn create(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GemDetail>)> {
    let profile = SellerRepository::new(state.pool())
        .get(seller.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Seller profile not found".to_string()))?;
    if !profile.verification_status.can_sell() {
        return Err(AppError::Forbidden(
            "Only verified sellers can list gems".to_string(),
        ));
    }

    let uploads = state.uploads();
    let form = MultipartForm::read(
        multipart,
        uploads,
        &[UploadField::Images, UploadField::Certificate],
    )
    .await?;

    let result = insert_listing(&state, &seller, &form).await;

    match result {
        Ok(detail) => {
            tracing::info!(gem_id = %detail.gem.id, "Gem listed");
            Ok((StatusCode::CREATED, Json(detail)))
        }
        Err(e) => {
            uploads.discard(&form.all_files()).await;
            Err(e)
        }
    }
}

/// Edit a listing. Approved or rejected listings go back to review.
///
/// # Errors
///
/// 403 for someone else's gem, 400 for invalid fields, 409 for a taken
/// certificate number.
pub async fn update(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<GemUpdate>,
) -> Result<Json<Gem>> {
    let id = GemId::new(id);
    owned_gem(&state, &seller, id).await?;
    validate_update(&body)?;

    let gem = GemRepository::new(state.pool()).update(id, &body).await?;
    Ok(Json(gem))
}

/// Delete a listing and its files. Sellers delete their own; admins any.
///
/// # Errors
///
/// 409 if the gem has been ordered.
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let id = GemId::new(id);
    if !user.is_admin() {
        owned_gem(&state, &user, id).await?;
    }

    let files = GemRepository::new(state.pool()).delete(id).await?;
    let urls: Vec<String> = files
        .image_urls
        .into_iter()
        .chain(files.certificate_file)
        .collect();
    state.uploads().discard(&urls).await;

    tracing::info!(gem_id = %id, deleted_by = %user.id, "Gem deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Append images to a listing.
///
/// # Errors
///
/// 403 for someone else's gem, 400 without images or with too many.
pub async fn add_images(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<GemImage>>)> {
    let id = GemId::new(id);
    owned_gem(&state, &seller, id).await?;

    let uploads = state.uploads();
    let form = MultipartForm::read(multipart, uploads, &[UploadField::Images]).await?;
    let urls = form.files(UploadField::Images);
    if urls.is_empty() {
        return Err(AppError::BadRequest("At least one image is required".to_string()));
    }

    match GemRepository::new(state.pool()).add_images(id, urls).await {
        Ok(images) => Ok((StatusCode::CREATED, Json(images))),
        Err(e) => {
            uploads.discard(urls).await;
            Err(e.into())
        }
    }
}

/// Remove one image. The next image in order becomes primary if needed.
///
/// # Errors
///
/// 403 for someone else's gem, 404 for an unknown image.
pub async fn delete_image(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i32, i32)>,
) -> Result<StatusCode> {
    let id = GemId::new(id);
    owned_gem(&state, &seller, id).await?;

    let url = GemRepository::new(state.pool())
        .delete_image(id, GemImageId::new(image_id))
        .await?;
    state.uploads().remove_url(&url).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn fields(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    fn assert_handler<T, H: axum::handler::Handler<T, AppState>>(_: H) {}

    #[test]
    fn test_file_handlers_are_routable() {
        assert_handler(create);
        assert_handler(delete);
        assert_handler(add_images);
        assert_handler(delete_image);
    }

    #[test]
    fn test_new_gem_from_fields() {
        let f = fields(&[
            ("name", "Kashmir Sapphire"),
            ("gem_type", "Sapphire"),
            ("price", "12500"),
            ("carat", "2.31"),
            ("certificate_number", "GIA-1234"),
            ("origin", "Kashmir"),
        ]);
        let gem = new_gem_from_fields(|n| f.get(n).copied(), None).unwrap();
        assert_eq!(gem.name, "Kashmir Sapphire");
        assert_eq!(gem.price.to_string(), "12500.00");
        assert_eq!(gem.carat, Decimal::new(231, 2));
        assert_eq!(gem.origin.as_deref(), Some("Kashmir"));
        assert_eq!(gem.stock_quantity, 1);
        assert!(gem.color.is_none());
    }

    #[test]
    fn test_new_gem_requires_fields() {
        let f = fields(&[("name", "Ruby"), ("price", "10"), ("carat", "1")]);
        let err = new_gem_from_fields(|n| f.get(n).copied(), None).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "gem_type is required"));
    }

    #[test]
    fn test_new_gem_rejects_bad_numbers() {
        let base = [
            ("name", "Ruby"),
            ("gem_type", "Ruby"),
            ("certificate_number", "C-1"),
        ];

        let mut f = fields(&base);
        f.insert("price", "-5");
        f.insert("carat", "1");
        assert!(new_gem_from_fields(|n| f.get(n).copied(), None).is_err());

        let mut f = fields(&base);
        f.insert("price", "5");
        f.insert("carat", "0");
        assert!(new_gem_from_fields(|n| f.get(n).copied(), None).is_err());

        let mut f = fields(&base);
        f.insert("price", "5");
        f.insert("carat", "1");
        f.insert("stock_quantity", "-1");
        assert!(new_gem_from_fields(|n| f.get(n).copied(), None).is_err());
    }

    #[test]
    fn test_validate_update() {
        assert!(validate_update(&GemUpdate::default()).is_err());
        assert!(
            validate_update(&GemUpdate {
                name: Some("  ".to_string()),
                ..GemUpdate::default()
            })
            .is_err()
        );
        assert!(
            validate_update(&GemUpdate {
                stock_quantity: Some(3),
                ..GemUpdate::default()
            })
            .is_ok()
        );
    }

    #[test]
    fn test_list_query_blank_filters_ignored() {
        let query = GemListQuery {
            q: Some("  ".to_string()),
            gem_type: Some(" Emerald ".to_string()),
            seller_id: Some(7),
            per_page: Some(500),
            ..GemListQuery::default()
        };
        let (search, pagination) = query.into_search();
        assert!(search.q.is_none());
        assert_eq!(search.gem_type.as_deref(), Some("Emerald"));
        assert_eq!(search.seller_id, Some(UserId::new(7)));
        assert_eq!(search.sort, GemSort::Newest);
        assert_eq!(pagination.per_page, 100);
    }
}
