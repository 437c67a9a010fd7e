//! Order models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;

use gemvault_core::{GemId, OrderId, OrderItemId, OrderStatus, PaymentMethod, Price, UserId};

use super::AddressSnapshot;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address: Json<AddressSnapshot>,
    pub total_amount: Price,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub gem_id: GemId,
    pub seller_id: UserId,
    pub gem_name: String,
    pub quantity: i32,
    pub unit_price: Price,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderStatusChange {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub changed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// An order with its lines and, for single-order views, its history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<OrderStatusChange>,
}

impl OrderDetail {
    /// Whether `seller_id` sold at least one line of this order.
    #[must_use]
    pub fn has_seller(&self, seller_id: UserId) -> bool {
        self.items.iter().any(|item| item.seller_id == seller_id)
    }
}
