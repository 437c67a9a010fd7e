//! Order repository: checkout, history and fulfilment.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use gemvault_core::{AddressId, GemId, GemStatus, OrderId, OrderStatus, PaymentMethod, Price, UserId};

use super::addresses::ADDRESS_COLUMNS;
use super::{Pagination, RepositoryError, carts};
use crate::models::{Address, AddressSnapshot, CartLine, Order, OrderDetail, OrderItem, OrderStatusChange};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.shipping_address, o.total_amount, o.status, \
     o.payment_method, o.notes, o.created_at, o.updated_at";

const ITEM_COLUMNS: &str = "id, order_id, gem_id, seller_id, gem_name, quantity, unit_price";

/// A gem row locked for the duration of a checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LockedGem {
    id: GemId,
    seller_id: UserId,
    name: String,
    price: Price,
    stock_quantity: i32,
    status: GemStatus,
}

/// An order line computed from a cart line and its locked gem.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedItem {
    gem_id: GemId,
    seller_id: UserId,
    gem_name: String,
    quantity: i32,
    unit_price: Price,
}

/// Validate every cart line against the locked gems and price the order.
///
/// Prices are taken from the locked rows, not the cart.
fn plan_checkout(
    buyer: UserId,
    lines: &[CartLine],
    locked: &[LockedGem],
) -> Result<(Vec<PlannedItem>, Price), RepositoryError> {
    if lines.is_empty() {
        return Err(RepositoryError::Invalid("Your cart is empty".to_string()));
    }

    let by_id: HashMap<GemId, &LockedGem> = locked.iter().map(|g| (g.id, g)).collect();
    let mut items = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in lines {
        let gem = by_id
            .get(&line.gem_id)
            .ok_or_else(|| RepositoryError::Invalid(format!("{} is no longer available", line.name)))?;
        if gem.seller_id == buyer {
            return Err(RepositoryError::Invalid(format!(
                "You cannot buy your own gem {}",
                gem.name
            )));
        }
        if !gem.status.is_purchasable() {
            return Err(RepositoryError::Invalid(format!(
                "{} is not available for purchase",
                gem.name
            )));
        }
        if line.quantity > gem.stock_quantity {
            return Err(RepositoryError::Invalid(format!(
                "Insufficient stock for {}: {} requested, {} available",
                gem.name, line.quantity, gem.stock_quantity
            )));
        }
        total += gem.price.times(line.quantity);
        items.push(PlannedItem {
            gem_id: gem.id,
            seller_id: gem.seller_id,
            gem_name: gem.name.clone(),
            quantity: line.quantity,
            unit_price: gem.price,
        });
    }

    let total = Price::new(total).map_err(|e| RepositoryError::Invalid(e.to_string()))?;
    Ok((items, total))
}

async fn items_on(
    conn: &mut PgConnection,
    order_ids: &[i32],
    seller_id: Option<UserId>,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(&format!(
        r"
        SELECT {ITEM_COLUMNS} FROM order_items
        WHERE order_id = ANY($1) AND ($2::int IS NULL OR seller_id = $2)
        ORDER BY order_id, id
        "
    ))
    .bind(order_ids)
    .bind(seller_id)
    .fetch_all(conn)
    .await
}

async fn history_on(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderStatusChange>, sqlx::Error> {
    sqlx::query_as::<_, OrderStatusChange>(
        "SELECT status, note, changed_by, created_at FROM order_status_history \
         WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

async fn record_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
    note: Option<&str>,
    changed_by: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, note, changed_by) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(status)
    .bind(note)
    .bind(changed_by)
    .execute(conn)
    .await?;
    Ok(())
}

/// Put the units of a cancelled order back in stock. Sold-out gems become approved again.
async fn restore_stock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE gems g
        SET stock_quantity = g.stock_quantity + oi.quantity,
            status = CASE WHEN g.status = 'sold_out' THEN 'approved'::gem_status ELSE g.status END,
            updated_at = NOW()
        FROM (SELECT gem_id, SUM(quantity)::int AS quantity
              FROM order_items WHERE order_id = $1 GROUP BY gem_id) oi
        WHERE g.id = oi.gem_id
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn lock_order(conn: &mut PgConnection, id: OrderId) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound("order"))
}

async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders o SET status = $2, updated_at = NOW() WHERE o.id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_one(conn)
    .await
}

/// Group lines under their orders, preserving order sequence.
fn attach_items(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<OrderDetail> {
    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }
    orders
        .into_iter()
        .map(|order| OrderDetail {
            items: by_order.remove(&order.id).unwrap_or_default(),
            history: Vec::new(),
            order,
        })
        .collect()
}

fn order_ids(orders: &[Order]) -> Vec<i32> {
    orders.iter().map(|o| o.id.as_i32()).collect()
}

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into a pending order.
    ///
    /// Locks the gems, checks availability, snapshots the address, decrements
    /// stock and empties the cart in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the cart is empty or a gem cannot be bought.
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping_address_id: AddressId,
        payment_method: PaymentMethod,
        notes: Option<&str>,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let lines = carts::lines_on(&mut *tx, user_id).await?;
        if lines.is_empty() {
            return Err(RepositoryError::Invalid("Your cart is empty".to_string()));
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shipping_addresses WHERE id = $1 AND user_id = $2"
        ))
        .bind(shipping_address_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("shipping address"))?;

        let gem_ids: Vec<i32> = lines.iter().map(|l| l.gem_id.as_i32()).collect();
        let locked = sqlx::query_as::<_, LockedGem>(
            "SELECT id, seller_id, name, price, stock_quantity, status FROM gems \
             WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&gem_ids)
        .fetch_all(&mut *tx)
        .await?;

        let (planned, total) = plan_checkout(user_id, &lines, &locked)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO orders AS o (user_id, shipping_address, total_amount, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(Json(AddressSnapshot::from(address)))
        .bind(total)
        .bind(payment_method)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?;

        for item in &planned {
            sqlx::query(
                "INSERT INTO order_items (order_id, gem_id, seller_id, gem_name, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id)
            .bind(item.gem_id)
            .bind(item.seller_id)
            .bind(&item.gem_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r"
                UPDATE gems
                SET stock_quantity = stock_quantity - $2,
                    status = CASE WHEN stock_quantity - $2 = 0 THEN 'sold_out'::gem_status ELSE status END,
                    updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(item.gem_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        record_status(&mut *tx, order.id, OrderStatus::Pending, Some("Order placed"), user_id).await?;
        carts::clear_on(&mut *tx, user_id).await?;

        let items = items_on(&mut *tx, &[order.id.as_i32()], None).await?;
        let history = history_on(&mut *tx, order.id).await?;
        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items,
            history,
        })
    }

    /// The user's orders with their lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let items = items_on(&mut *conn, &order_ids(&orders), None).await?;
        Ok(attach_items(orders, items))
    }

    /// One order with every line and its status history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let items = items_on(&mut *conn, &[id.as_i32()], None).await?;
        let history = history_on(&mut *conn, id).await?;
        Ok(Some(OrderDetail {
            order,
            items,
            history,
        }))
    }

    /// Buyer cancellation. Only pending or confirmed orders can be cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not the buyer's.
    /// Returns `RepositoryError::Conflict` if the order has progressed too far.
    pub async fn cancel(&self, id: OrderId, buyer_id: UserId) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut *tx, id).await?;
        if order.user_id != buyer_id {
            return Err(RepositoryError::NotFound("order"));
        }
        if !order.status.is_buyer_cancellable() {
            return Err(RepositoryError::Conflict(format!(
                "Order is {} and can no longer be cancelled",
                order.status
            )));
        }

        let order = set_status(&mut *tx, id, OrderStatus::Cancelled).await?;
        restore_stock(&mut *tx, id).await?;
        record_status(&mut *tx, id, OrderStatus::Cancelled, Some("Cancelled by buyer"), buyer_id)
            .await?;

        let items = items_on(&mut *tx, &[id.as_i32()], None).await?;
        let history = history_on(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items,
            history,
        })
    }

    /// Move an order along its lifecycle. Cancelling restores stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        note: Option<&str>,
        changed_by: UserId,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut *tx, id).await?;
        if !order.status.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "Cannot change order status from {} to {next}",
                order.status
            )));
        }

        let order = set_status(&mut *tx, id, next).await?;
        if next == OrderStatus::Cancelled {
            restore_stock(&mut *tx, id).await?;
        }
        record_status(&mut *tx, id, next, note, changed_by).await?;

        let items = items_on(&mut *tx, &[id.as_i32()], None).await?;
        let history = history_on(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items,
            history,
        })
    }

    /// Orders containing the seller's gems, with only the seller's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn seller_orders(&self, seller_id: UserId) -> Result<Vec<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders o
            WHERE EXISTS (SELECT 1 FROM order_items oi WHERE oi.order_id = o.id AND oi.seller_id = $1)
            ORDER BY o.created_at DESC, o.id DESC
            "
        ))
        .bind(seller_id)
        .fetch_all(&mut *conn)
        .await?;

        let items = items_on(&mut *conn, &order_ids(&orders), Some(seller_id)).await?;
        Ok(attach_items(orders, items))
    }

    /// All orders for admins, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<(Vec<OrderDetail>, i64), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders o
            WHERE ($1::order_status IS NULL OR o.status = $1)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(&mut *conn)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;

        let items = items_on(&mut *conn, &order_ids(&orders), None).await?;
        Ok((attach_items(orders, items), total))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn line(gem: i32, quantity: i32, cart_price: &str) -> CartLine {
        CartLine {
            gem_id: GemId::new(gem),
            name: format!("Gem {gem}"),
            price: Price::parse(cart_price).unwrap(),
            quantity,
            stock_quantity: 10,
            status: GemStatus::Approved,
            image_url: None,
            line_total: Decimal::ZERO,
        }
    }

    fn locked(gem: i32, seller: i32, price: &str, stock: i32, status: GemStatus) -> LockedGem {
        LockedGem {
            id: GemId::new(gem),
            seller_id: UserId::new(seller),
            name: format!("Gem {gem}"),
            price: Price::parse(price).unwrap(),
            stock_quantity: stock,
            status,
        }
    }

    const BUYER: UserId = UserId::new(1);

    #[test]
    fn test_plan_uses_locked_prices() {
        let lines = [line(10, 2, "1.00"), line(11, 1, "1.00")];
        let gems = [
            locked(10, 5, "250.00", 3, GemStatus::Approved),
            locked(11, 6, "99.99", 1, GemStatus::Approved),
        ];
        let (items, total) = plan_checkout(BUYER, &lines, &gems).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, Price::parse("250.00").unwrap());
        assert_eq!(items[1].seller_id, UserId::new(6));
        assert_eq!(total, Price::parse("599.99").unwrap());
    }

    #[test]
    fn test_plan_rejects_empty_cart() {
        let err = plan_checkout(BUYER, &[], &[]).unwrap_err();
        assert_eq!(err.to_string(), "Your cart is empty");
    }

    #[test]
    fn test_plan_rejects_insufficient_stock() {
        let lines = [line(10, 4, "1.00")];
        let gems = [locked(10, 5, "10.00", 3, GemStatus::Approved)];
        let err = plan_checkout(BUYER, &lines, &gems).unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(ref m) if m.contains("Gem 10")));
    }

    #[test]
    fn test_plan_rejects_unavailable_gems() {
        let lines = [line(10, 1, "1.00")];
        let sold_out = [locked(10, 5, "10.00", 0, GemStatus::SoldOut)];
        assert!(plan_checkout(BUYER, &lines, &sold_out).is_err());
        assert!(plan_checkout(BUYER, &lines, &[]).is_err());
        let own = [locked(10, 1, "10.00", 5, GemStatus::Approved)];
        assert!(plan_checkout(BUYER, &lines, &own).is_err());
    }

    #[test]
    fn test_attach_items_groups_by_order() {
        let order = |id: i32| Order {
            id: OrderId::new(id),
            user_id: BUYER,
            shipping_address: Json(AddressSnapshot {
                full_name: "Ada".to_string(),
                phone: None,
                address_line1: "1 Main St".to_string(),
                address_line2: None,
                city: "Colombo".to_string(),
                state: None,
                postal_code: "00100".to_string(),
                country: "LK".to_string(),
            }),
            total_amount: Price::parse("10").unwrap(),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Card,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let item = |id: i32, order_id: i32| OrderItem {
            id: gemvault_core::OrderItemId::new(id),
            order_id: OrderId::new(order_id),
            gem_id: GemId::new(1),
            seller_id: UserId::new(2),
            gem_name: "Ruby".to_string(),
            quantity: 1,
            unit_price: Price::parse("10").unwrap(),
        };

        let details = attach_items(vec![order(2), order(1)], vec![item(1, 1), item(2, 2), item(3, 2)]);
        assert_eq!(details[0].order.id, OrderId::new(2));
        assert_eq!(details[0].items.len(), 2);
        assert_eq!(details[1].items.len(), 1);
        assert!(details[1].history.is_empty());
    }
}
