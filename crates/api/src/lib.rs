//! GemVault marketplace API library.
//!
//! The binary in `main.rs` only loads configuration, sets up tracing and
//! serves [`build_router`]; everything else lives here so it can be tested.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::from_fn,
    routing::get,
};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{RateLimitConfigError, request_id_middleware};
use crate::services::uploads::PUBLIC_PREFIX;
use crate::state::AppState;

/// Errors assembling the router.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    RateLimit(#[from] RateLimitConfigError),
    #[error("invalid CORS origin {0}")]
    InvalidOrigin(String),
}

fn cors_layer(frontend_url: &str) -> Result<CorsLayer, RouterError> {
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
        .map_err(|_| RouterError::InvalidOrigin(frontend_url.to_owned()))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static(
            middleware::request_id::REQUEST_ID_HEADER,
        )]))
}

/// Build the full application router.
///
/// # Errors
///
/// Returns `RouterError` if a rate limiter or the CORS origin is invalid.
pub fn build_router(state: AppState) -> Result<Router, RouterError> {
    let cors = cors_layer(&state.config().frontend_url)?;
    let uploads = ServeDir::new(state.uploads().root());

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::routes(state.config().rate_limit)?)
        .nest_service(PUBLIC_PREFIX, uploads)
        .with_state(state)
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(trace)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}

/// Liveness health check. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check. 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ApiConfig;

    /// Router over a pool that never connects; only routes that skip the
    /// database are exercised.
    fn test_router(dir: &tempfile::TempDir) -> Router {
        let mut config = ApiConfig::for_tests(dir.path().to_path_buf());
        config.rate_limit = false;
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/gemvault_test")
            .unwrap();
        build_router(AppState::new(config, pool).unwrap()).unwrap()
    }

    #[test]
    fn test_cors_layer_accepts_origin() {
        assert!(cors_layer("http://localhost:3000/").is_ok());
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(RouterError::InvalidOrigin(_))
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_router(&dir)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let missing = router
            .clone()
            .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let garbage = router
            .oneshot(
                Request::get("/api/admin/dashboard")
                    .header(header::AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_router(&dir)
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_uploads_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gems")).unwrap();
        std::fs::write(dir.path().join("gems/a.txt"), "stone").unwrap();

        let resp = test_router(&dir)
            .oneshot(Request::get("/uploads/gems/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
