//! Checkout and order handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{AddressId, OrderId, OrderStatus, PaymentMethod};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireSeller};
use crate::models::{CurrentUser, OrderDetail};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address_id: i32,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

/// Whether `user` may see or manage `order`.
fn can_view(user: &CurrentUser, order: &OrderDetail) -> bool {
    user.is_admin() || order.order.user_id == user.id || order.has_seller(user.id)
}

/// Turn the cart into an order.
///
/// # Errors
///
/// 400 for an empty cart or an unavailable gem, 404 for someone else's address.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let notes = body.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let order = OrderRepository::new(state.pool())
        .checkout(
            user.id,
            AddressId::new(body.shipping_address_id),
            body.payment_method,
            notes,
        )
        .await?;

    tracing::info!(
        order_id = %order.order.id,
        total = %order.order.total_amount,
        "Order placed"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, newest first.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderDetail>>> {
    Ok(Json(
        OrderRepository::new(state.pool()).list_for_user(user.id).await?,
    ))
}

/// One order with items and history.
///
/// # Errors
///
/// 404 unless the caller bought, sold into, or administers the order.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get_detail(OrderId::new(id))
        .await?
        .filter(|o| can_view(&user, o))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(order))
}

/// Buyer cancellation while the order is pending or confirmed.
///
/// # Errors
///
/// 404 for someone else's order, 409 once it is processing or later.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .cancel(OrderId::new(id), user.id)
        .await?;
    tracing::info!(order_id = %order.order.id, "Order cancelled by buyer");
    Ok(Json(order))
}

/// Move an order along its lifecycle. Sellers with lines in it and admins only.
///
/// # Errors
///
/// 404 when the caller has no stake in the order, 403 for buyers,
/// 409 for a disallowed transition.
#[instrument(skip(state, body), fields(user_id = %user.id, status = %body.status))]
pub async fn update_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<OrderDetail>> {
    let id = OrderId::new(id);
    let repo = OrderRepository::new(state.pool());

    let existing = repo
        .get_detail(id)
        .await?
        .filter(|o| can_view(&user, o))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    if !user.is_admin() && !existing.has_seller(user.id) {
        return Err(AppError::Forbidden(
            "Only sellers in this order or admins can change its status".to_string(),
        ));
    }

    let note = body.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let order = repo.update_status(id, body.status, note, user.id).await?;
    tracing::info!(order_id = %id, "Order status changed");
    Ok(Json(order))
}

/// Orders containing the seller's gems, restricted to the seller's lines.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn seller_orders(
    RequireSeller(seller): RequireSeller,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderDetail>>> {
    Ok(Json(
        OrderRepository::new(state.pool()).seller_orders(seller.id).await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_request_parsing() {
        let body: CheckoutRequest = serde_json::from_str(
            r#"{"shipping_address_id": 3, "payment_method": "bank_transfer"}"#,
        )
        .unwrap();
        assert_eq!(body.payment_method, PaymentMethod::BankTransfer);
        assert!(body.notes.is_none());

        assert!(
            serde_json::from_str::<CheckoutRequest>(
                r#"{"shipping_address_id": 3, "payment_method": "cheque"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_status_update_parsing() {
        let body: StatusUpdateRequest =
            serde_json::from_str(r#"{"status": "shipped", "note": "DHL 123"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);
        assert_eq!(body.note.as_deref(), Some("DHL 123"));
    }
}
