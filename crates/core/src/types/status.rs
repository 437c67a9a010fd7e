//! Status and role enums for marketplace entities.
//!
//! Each enum maps to a `PostgreSQL` enum type of the same snake_case name
//! (with the `postgres` feature) and serializes as snake_case JSON.

use serde::{Deserialize, Serialize};

/// Implements `Display` and `FromStr` from a list of `Variant => "text"` pairs.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The snake_case string for this value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Marketplace user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Browses, buys and reviews.
    #[default]
    Buyer,
    /// Lists gems for sale (after verification).
    Seller,
    /// Moderates sellers, gems, orders and blog content.
    Admin,
    /// Admin who can also manage other admins.
    SuperAdmin,
}

string_enum!(UserRole, "user role", {
    Buyer => "buyer",
    Seller => "seller",
    Admin => "admin",
    SuperAdmin => "super_admin",
});

impl UserRole {
    /// Whether this role can use the admin moderation endpoints.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    /// Whether a user may pick this role at self-registration.
    #[must_use]
    pub const fn is_self_assignable(&self) -> bool {
        matches!(self, Self::Buyer | Self::Seller)
    }
}

/// Admin-moderated verification state of a seller account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "seller_verification", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SellerVerification {
    #[default]
    Pending,
    Verified,
    Rejected,
    Suspended,
}

string_enum!(SellerVerification, "seller verification status", {
    Pending => "pending",
    Verified => "verified",
    Rejected => "rejected",
    Suspended => "suspended",
});

impl SellerVerification {
    /// Only verified sellers may create listings and appear publicly.
    #[must_use]
    pub const fn can_sell(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Review and availability state of a gem listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "gem_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum GemStatus {
    /// Awaiting admin review.
    #[default]
    Pending,
    /// Publicly listed.
    Approved,
    /// Refused by an admin (with a reason).
    Rejected,
    /// Approved but out of stock.
    SoldOut,
}

string_enum!(GemStatus, "gem status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    SoldOut => "sold_out",
});

impl GemStatus {
    /// Whether the listing is visible in the public catalog.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Approved | Self::SoldOut)
    }

    /// Whether the listing can be added to a cart or bought.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Lifecycle of an order.
///
/// ```text
/// pending -> confirmed -> processing -> shipped -> delivered
///    |           |            |
///    +-----------+------------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether the buyer may still cancel the order themselves.
    #[must_use]
    pub const fn is_buyer_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// How the buyer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
}

string_enum!(PaymentMethod, "payment method", {
    Card => "card",
    BankTransfer => "bank_transfer",
    CashOnDelivery => "cash_on_delivery",
});

/// Publication state of a blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "blog_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

string_enum!(BlogStatus, "blog status", {
    Draft => "draft",
    Published => "published",
    Archived => "archived",
});

/// Kind of jewelry piece for AI-assisted designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JewelryType {
    Ring,
    Necklace,
    Earrings,
    Bracelet,
    Pendant,
    Brooch,
}

string_enum!(JewelryType, "jewelry type", {
    Ring => "ring",
    Necklace => "necklace",
    Earrings => "earrings",
    Bracelet => "bracelet",
    Pendant => "pendant",
    Brooch => "brooch",
});
