//! Cart handlers. Every authenticated user has one cart, created on first add.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::GemId;

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub gem_id: i32,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// The caller's cart.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Cart>> {
    Ok(Json(CartRepository::new(state.pool()).get(user.id).await?))
}

/// Add a gem, merging with an existing line.
///
/// # Errors
///
/// 400 for a non-positive quantity, an unavailable or own gem, or too little
/// stock; 404 for an unknown gem.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn add_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<Cart>> {
    if body.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }
    let cart = CartRepository::new(state.pool())
        .add_item(user.id, GemId::new(body.gem_id), body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Set a line's quantity; 0 removes it.
///
/// # Errors
///
/// 400 for a negative quantity or too little stock, 404 for a missing line.
pub async fn set_quantity(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(gem_id): Path<i32>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<Cart>> {
    if body.quantity < 0 {
        return Err(AppError::BadRequest("quantity cannot be negative".to_string()));
    }
    let cart = CartRepository::new(state.pool())
        .set_quantity(user.id, GemId::new(gem_id), body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove a line.
///
/// # Errors
///
/// 404 for a missing line.
pub async fn remove_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(gem_id): Path<i32>,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool())
        .remove_item(user.id, GemId::new(gem_id))
        .await?;
    Ok(Json(cart))
}

/// Empty the cart.
///
/// # Errors
///
/// 500 if the delete fails.
pub async fn clear(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Cart>> {
    Ok(Json(CartRepository::new(state.pool()).clear(user.id).await?))
}
