//! Shipping address handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use gemvault_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput};
use crate::state::AppState;

fn validate(input: &AddressInput) -> Result<()> {
    let missing = input.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// The caller's addresses, default first.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

/// Add an address. The first one becomes the default.
///
/// # Errors
///
/// 400 for missing required fields.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    validate(&body)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Replace an address.
///
/// # Errors
///
/// 400 for missing required fields, 404 for someone else's address.
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<AddressInput>,
) -> Result<Json<Address>> {
    validate(&body)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, AddressId::new(id), &body)
        .await?;
    Ok(Json(address))
}

/// Delete an address, promoting another to default if needed.
///
/// # Errors
///
/// 404 for someone else's address.
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, AddressId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make an address the default.
///
/// # Errors
///
/// 404 for someone else's address.
pub async fn set_default(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Address>> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, AddressId::new(id))
        .await?;
    Ok(Json(address))
}
