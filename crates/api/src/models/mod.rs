//! Domain models returned by repositories and serialized by handlers.

pub mod address;
pub mod blog;
pub mod cart;
pub mod design;
pub mod gem;
pub mod order;
pub mod review;
pub mod seller;
pub mod user;

use serde::Serialize;

pub use address::{Address, AddressInput, AddressSnapshot};
pub use blog::{BlogPost, BlogPostSummary};
pub use cart::{Cart, CartLine};
pub use design::{Design, GenerationOutcome, MaterialLine, Refinement};
pub use gem::{Gem, GemDetail, GemImage, GemSummary, GemTypeCount};
pub use order::{Order, OrderDetail, OrderItem, OrderStatusChange};
pub use review::Review;
pub use seller::{PublicSellerProfile, Seller, SellerWithOwner};
pub use user::{CurrentUser, User};

use crate::db::Pagination;

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }
}
