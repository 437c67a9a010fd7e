//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST /api/auth/register             - Create buyer or seller account
//! POST /api/auth/login                - Exchange credentials for a token
//! GET  /api/auth/me                   - Current user (+ seller profile)
//! PUT  /api/auth/me                   - Update name/phone
//! POST /api/auth/change-password      - Change password
//! POST /api/auth/forgot-password      - Email a reset link
//! POST /api/auth/reset-password       - Reset with a token
//!
//! # Gems
//! GET  /api/gems                      - Search approved listings
//! POST /api/gems                      - Create listing (seller, multipart)
//! GET  /api/gems/types                - Gem types with counts
//! GET  /api/gems/{id}                 - Listing detail
//! PUT  /api/gems/{id}                 - Update listing (owner)
//! DEL  /api/gems/{id}                 - Delete listing (owner or admin)
//! POST /api/gems/{id}/images          - Add images (owner, multipart)
//! DEL  /api/gems/{id}/images/{image}  - Remove image (owner)
//!
//! # Cart, orders, addresses
//! /api/cart, /api/orders, /api/addresses
//!
//! # Sellers
//! GET  /api/sellers/{id}              - Public profile
//! GET  /api/sellers/{id}/reviews      - Reviews
//! POST /api/sellers/{id}/reviews      - Review after delivery
//! /api/seller/*                       - Own profile, documents, listings, orders, dashboard
//!
//! # Content and designs
//! /api/blog, /api/designs, /api/admin/*
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod blog;
pub mod cart;
pub mod designs;
pub mod gems;
pub mod orders;
pub mod seller;
pub mod sellers;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};

use crate::middleware::{RateLimitConfigError, api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Request body limit for multipart upload routes.
pub const MAX_UPLOAD_BODY: usize = 50 * 1024 * 1024;

/// Routes for `/api/auth`.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/change-password", post(auth::change_password))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
}

/// Routes for `/api/gems`.
pub fn gem_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(gems::index)
                .post(gems::create)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route("/types", get(gems::types))
        .route(
            "/{id}",
            get(gems::show).put(gems::update).delete(gems::delete),
        )
        .route(
            "/{id}/images",
            post(gems::add_images).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route("/{id}/images/{image_id}", delete(gems::delete_image))
}

/// Routes for `/api/cart`.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{gem_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
}

/// Routes for `/api/orders`.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/checkout", post(orders::checkout))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", patch(orders::update_status))
}

/// Routes for `/api/addresses`.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            put(addresses::update).delete(addresses::delete),
        )
        .route("/{id}/default", post(addresses::set_default))
}

/// Routes for `/api/sellers` (public profiles).
pub fn seller_profile_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(sellers::show))
        .route(
            "/{id}/reviews",
            get(sellers::reviews).post(sellers::create_review),
        )
}

/// Routes for `/api/seller` (the signed-in seller).
pub fn seller_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(seller::profile).put(seller::update_profile),
        )
        .route(
            "/profile/image",
            post(seller::upload_profile_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route(
            "/verification-documents",
            post(seller::upload_verification_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route("/gems", get(seller::gems))
        .route("/orders", get(orders::seller_orders))
        .route("/dashboard", get(seller::dashboard))
}

/// Routes for `/api/blog`.
pub fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(blog::index))
        .route("/{slug}", get(blog::show))
}

/// Routes for `/api/designs`.
pub fn design_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(designs::index).post(designs::create))
        .route("/{id}", get(designs::show).delete(designs::delete))
        .route("/{id}/refine", post(designs::refine))
        .route("/{id}/materials", put(designs::set_materials))
}

/// Everything under `/api`. When `rate_limited`, auth routes get the strict
/// limiter and the rest the general one.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if a limiter cannot be built.
pub fn routes(rate_limited: bool) -> Result<Router<AppState>, RateLimitConfigError> {
    let mut auth = auth_routes();
    let mut api = Router::new()
        .nest("/gems", gem_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/addresses", address_routes())
        .nest("/sellers", seller_profile_routes())
        .nest("/seller", seller_routes())
        .nest("/blog", blog_routes())
        .nest("/designs", design_routes())
        .nest("/admin", admin::router());

    if rate_limited {
        auth = auth.layer(auth_rate_limiter()?);
        api = api.layer(api_rate_limiter()?);
    } else {
        tracing::warn!("Rate limiting is disabled");
    }

    Ok(Router::new().nest("/auth", auth).merge(api))
}
