//! Admin moderation endpoints, mounted under `/api/admin`.
//!
//! Every handler requires an admin; account role changes, deletions and admin
//! creation require a super admin.

pub mod blog;
pub mod dashboard;
pub mod gems;
pub mod orders;
pub mod sellers;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

use crate::state::AppState;

use super::MAX_UPLOAD_BODY;

/// Routes for `/api/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/users", get(users::index))
        .route("/users/{id}", axum::routing::delete(users::delete))
        .route("/users/{id}/status", patch(users::set_status))
        .route("/users/{id}/role", patch(users::set_role))
        .route("/admins", post(users::create_admin))
        .route("/sellers", get(sellers::index))
        .route("/sellers/{user_id}/verification", patch(sellers::set_verification))
        .route("/gems", get(gems::index))
        .route("/gems/{id}/review", patch(gems::review))
        .route("/orders", get(orders::index))
        .route(
            "/blog",
            get(blog::index)
                .post(blog::create)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route(
            "/blog/{id}",
            get(blog::show)
                .put(blog::update)
                .delete(blog::delete)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
}
