//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. CORS
//! 5. Rate limiting (per route group)
//!
//! Authentication is done per handler through the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth, RequireSeller, RequireSuperAdmin};
pub use rate_limit::{RateLimitConfigError, api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
