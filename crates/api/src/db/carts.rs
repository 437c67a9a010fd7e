//! Shopping cart repository. Each user has one cart, created on first add.

use sqlx::{PgConnection, PgPool};

use gemvault_core::{CartId, GemId, GemStatus, UserId};

use super::RepositoryError;
use crate::models::{Cart, CartLine};

const LINES_QUERY: &str = r"
    SELECT ci.gem_id, g.name, g.price, ci.quantity, g.stock_quantity, g.status,
           (SELECT i.image_url FROM gem_images i
             WHERE i.gem_id = g.id
             ORDER BY i.is_primary DESC, i.sort_order, i.id
             LIMIT 1) AS image_url
    FROM cart_items ci
    JOIN carts c ON c.id = ci.cart_id
    JOIN gems g ON g.id = ci.gem_id
    WHERE c.user_id = $1
    ORDER BY ci.added_at, ci.id
";

#[derive(Debug, sqlx::FromRow)]
struct PurchasableRow {
    seller_id: UserId,
    name: String,
    status: GemStatus,
    stock_quantity: i32,
}

/// Cart lines of a user, read on an existing connection or transaction.
pub(crate) async fn lines_on(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(LINES_QUERY)
        .bind(user_id)
        .fetch_all(conn)
        .await
}

/// Remove every line from a user's cart.
pub(crate) async fn clear_on(conn: &mut PgConnection, user_id: UserId) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Check that `buyer` may hold `quantity` units of a gem.
fn check_purchasable(
    gem: &PurchasableRow,
    buyer: UserId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    if gem.seller_id == buyer {
        return Err(RepositoryError::Invalid(
            "You cannot add your own gem to the cart".to_string(),
        ));
    }
    if !gem.status.is_purchasable() {
        return Err(RepositoryError::Invalid(format!(
            "{} is not available for purchase",
            gem.name
        )));
    }
    if quantity > gem.stock_quantity {
        return Err(RepositoryError::Invalid(format!(
            "Only {} of {} in stock",
            gem.stock_quantity, gem.name
        )));
    }
    Ok(())
}

/// Repository for cart operations, scoped to the owning user.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart with totals. A user without a cart has an empty one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let lines = lines_on(&mut *conn, user_id).await?;
        Ok(Cart::from_lines(lines))
    }

    async fn gem_for_update(
        conn: &mut PgConnection,
        gem_id: GemId,
    ) -> Result<PurchasableRow, RepositoryError> {
        sqlx::query_as::<_, PurchasableRow>(
            "SELECT seller_id, name, status, stock_quantity FROM gems WHERE id = $1 FOR SHARE",
        )
        .bind(gem_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound("gem"))
    }

    async fn current_quantity(
        conn: &mut PgConnection,
        user_id: UserId,
        gem_id: GemId,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT ci.quantity FROM cart_items ci JOIN carts c ON c.id = ci.cart_id \
             WHERE c.user_id = $1 AND ci.gem_id = $2",
        )
        .bind(user_id)
        .bind(gem_id)
        .fetch_optional(conn)
        .await
    }

    /// Add units of a gem, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the gem does not exist.
    /// Returns `RepositoryError::Invalid` if the gem is the buyer's own, not
    /// approved, or the merged quantity exceeds stock.
    pub async fn add_item(
        &self,
        user_id: UserId,
        gem_id: GemId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let gem = Self::gem_for_update(&mut *tx, gem_id).await?;
        let existing = Self::current_quantity(&mut *tx, user_id, gem_id)
            .await?
            .unwrap_or(0);
        check_purchasable(&gem, user_id, existing + quantity)?;

        let cart_id: CartId = sqlx::query_scalar(
            "INSERT INTO carts (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW() RETURNING id",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO cart_items (cart_id, gem_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, gem_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            ",
        )
        .bind(cart_id)
        .bind(gem_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        let lines = lines_on(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(Cart::from_lines(lines))
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart has no line for the gem.
    /// Returns `RepositoryError::Invalid` if the quantity exceeds stock.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        gem_id: GemId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        if quantity == 0 {
            return self.remove_item(user_id, gem_id).await;
        }

        let mut tx = self.pool.begin().await?;

        if Self::current_quantity(&mut *tx, user_id, gem_id)
            .await?
            .is_none()
        {
            return Err(RepositoryError::NotFound("cart item"));
        }
        let gem = Self::gem_for_update(&mut *tx, gem_id).await?;
        check_purchasable(&gem, user_id, quantity)?;

        sqlx::query(
            "UPDATE cart_items SET quantity = $3 \
             WHERE gem_id = $2 AND cart_id = (SELECT id FROM carts WHERE user_id = $1)",
        )
        .bind(user_id)
        .bind(gem_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        let lines = lines_on(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(Cart::from_lines(lines))
    }

    /// Remove a gem from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart has no line for the gem.
    pub async fn remove_item(&self, user_id: UserId, gem_id: GemId) -> Result<Cart, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM cart_items \
             WHERE gem_id = $2 AND cart_id = (SELECT id FROM carts WHERE user_id = $1)",
        )
        .bind(user_id)
        .bind(gem_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("cart item"));
        }
        self.get(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_on(&mut *conn, user_id).await?;
        Ok(Cart::from_lines(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gem(seller: i32, status: GemStatus, stock: i32) -> PurchasableRow {
        PurchasableRow {
            seller_id: UserId::new(seller),
            name: "Kashmir Sapphire".to_string(),
            status,
            stock_quantity: stock,
        }
    }

    #[test]
    fn test_cannot_buy_own_gem() {
        let result = check_purchasable(&gem(7, GemStatus::Approved, 3), UserId::new(7), 1);
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
    }

    #[test]
    fn test_must_be_approved() {
        for status in [GemStatus::Pending, GemStatus::Rejected, GemStatus::SoldOut] {
            let result = check_purchasable(&gem(7, status, 3), UserId::new(1), 1);
            assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        }
    }

    #[test]
    fn test_quantity_limited_by_stock() {
        let g = gem(7, GemStatus::Approved, 2);
        assert!(check_purchasable(&g, UserId::new(1), 2).is_ok());
        let err = check_purchasable(&g, UserId::new(1), 3).unwrap_err();
        assert_eq!(err.to_string(), "Only 2 of Kashmir Sapphire in stock");
    }
}
