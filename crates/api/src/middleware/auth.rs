//! Bearer-token authentication extractors.
//!
//! Tokens are verified against the JWT secret, then the subject is looked up
//! so that deactivation and role changes take effect on the next request.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use gemvault_core::UserRole;

use crate::db::UserRepository;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Extractor that requires a valid bearer token for an active account.
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that resolves the caller when a valid token is present.
///
/// Missing or invalid tokens yield `None` rather than a rejection.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Requires the `seller` role.
pub struct RequireSeller(pub CurrentUser);

/// Requires `admin` or `super_admin`.
pub struct RequireAdmin(pub CurrentUser);

/// Requires `super_admin`.
pub struct RequireSuperAdmin(pub CurrentUser);

/// Why a request was refused by an auth extractor.
#[derive(Debug)]
pub enum AuthRejection {
    /// No `Authorization: Bearer` header.
    MissingToken,
    /// Token bad, expired, or its user is gone.
    InvalidToken,
    /// The account is deactivated.
    Disabled,
    /// Authenticated but the role does not allow this.
    Forbidden,
    /// User lookup failed.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            Self::Disabled => (StatusCode::FORBIDDEN, "Account is disabled"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Insufficient permissions"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AuthRejection> {
    let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;
    let claims = state
        .jwt()
        .verify(token)
        .map_err(|_| AuthRejection::InvalidToken)?;

    let status = UserRepository::new(state.pool())
        .auth_status(claims.user_id())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load user for token");
            AuthRejection::Internal
        })?
        .ok_or(AuthRejection::InvalidToken)?;

    if !status.is_active {
        return Err(AuthRejection::Disabled);
    }

    Ok(CurrentUser {
        id: claims.user_id(),
        email: status.email,
        role: status.role,
    })
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(AuthRejection::Internal) => Err(AuthRejection::Internal),
            Err(_) => Ok(Self(None)),
        }
    }
}

fn require_role(user: CurrentUser, allowed: impl Fn(UserRole) -> bool) -> Result<CurrentUser, AuthRejection> {
    if allowed(user.role) {
        Ok(user)
    } else {
        Err(AuthRejection::Forbidden)
    }
}

impl FromRequestParts<AppState> for RequireSeller {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        require_role(user, |role| role == UserRole::Seller).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        require_role(user, |role| role.is_admin()).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        require_role(user, |role| role == UserRole::SuperAdmin).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use gemvault_core::UserId;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_role_gate() {
        let user = CurrentUser {
            id: UserId::new(1),
            email: "a@example.com".to_string(),
            role: UserRole::Admin,
        };
        assert!(require_role(user.clone(), |r| r.is_admin()).is_ok());
        assert!(matches!(
            require_role(user, |r| r == UserRole::SuperAdmin),
            Err(AuthRejection::Forbidden)
        ));
    }

    #[test]
    fn test_rejection_status() {
        assert_eq!(
            AuthRejection::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Disabled.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
