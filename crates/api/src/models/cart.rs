//! Shopping cart models.

use rust_decimal::Decimal;
use serde::Serialize;

use gemvault_core::{GemId, GemStatus, Price};

/// One cart line joined with its gem.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub gem_id: GemId,
    pub name: String,
    pub price: Price,
    pub quantity: i32,
    pub stock_quantity: i32,
    pub status: GemStatus,
    pub image_url: Option<String>,
    #[sqlx(skip)]
    pub line_total: Decimal,
}

/// A user's cart with computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
    pub item_count: i64,
}

impl Cart {
    /// Compute line totals, the subtotal and the unit count.
    #[must_use]
    pub fn from_lines(mut items: Vec<CartLine>) -> Self {
        let mut subtotal = Decimal::ZERO;
        let mut item_count = 0_i64;
        for line in &mut items {
            line.line_total = line.price.times(line.quantity);
            subtotal += line.line_total;
            item_count += i64::from(line.quantity);
        }
        Self {
            items,
            subtotal,
            item_count,
        }
    }
}
