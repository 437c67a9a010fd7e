//! Account route handlers: registration, login, profile and password flows.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use gemvault_core::UserRole;

use crate::db::users::NewSellerProfile;
use crate::db::{SellerRepository, UserRepository};
use crate::error::{AppError, Result, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::{AddressInput, Seller, User};
use crate::services::auth::{AuthService, Registration};
use crate::services::email::reset_url;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub seller: Option<NewSellerProfile>,
    pub address: Option<AddressInput>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Token plus the account it was issued for.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// The caller with their seller profile, if any.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub seller: Option<Seller>,
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent";

/// Register a buyer or seller.
///
/// # Errors
///
/// 400 for invalid input, 409 when the email is taken.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let registration = Registration {
        email: body.email,
        password: body.password,
        first_name: body.first_name,
        last_name: body.last_name,
        phone: body.phone,
        role: body.role.unwrap_or_default(),
        seller: body.seller,
        address: body.address,
    };

    let user = AuthService::new(state.pool()).register(registration).await?;
    let token = state.jwt().issue(&user)?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Exchange credentials for a token.
///
/// # Errors
///
/// 401 for wrong credentials, 403 for disabled accounts.
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;
    let token = state.jwt().issue(&user)?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { token, user }))
}

/// The caller's account.
///
/// # Errors
///
/// 404 if the account vanished between auth and lookup.
pub async fn me(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let seller = SellerRepository::new(state.pool()).get(current.id).await?;
    Ok(Json(MeResponse { user, seller }))
}

/// Update name and phone.
///
/// # Errors
///
/// 400 when a name is blanked.
pub async fn update_me(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<User>> {
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&body.first_name) || blank(&body.last_name) {
        return Err(AppError::BadRequest(
            "first_name and last_name cannot be empty".to_string(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .update_profile(
            current.id,
            body.first_name.as_deref().map(str::trim),
            body.last_name.as_deref().map(str::trim),
            body.phone.as_deref(),
        )
        .await?;
    Ok(Json(user))
}

/// Change the caller's password.
///
/// # Errors
///
/// 401 when the current password is wrong, 400 when the new one is too short.
pub async fn change_password(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool())
        .change_password(current.id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password updated" })))
}

/// Start a password reset. Always answers 200.
///
/// # Errors
///
/// 500 only if the token cannot be stored.
#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    let issued = AuthService::new(state.pool())
        .request_password_reset(&body.email)
        .await?;

    if let Some((user, token)) = issued {
        let link = reset_url(&state.config().frontend_url, &token);
        match state.email() {
            Some(email) => {
                if let Err(e) = email
                    .send_password_reset(user.email.as_str(), &user.first_name, &link)
                    .await
                {
                    tracing::error!(error = %e, user_id = %user.id, "Failed to send password reset email");
                }
            }
            None => tracing::info!(user_id = %user.id, reset_url = %link, "Password reset requested"),
        }
    }

    Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })))
}

/// Complete a password reset.
///
/// # Errors
///
/// 400 for an unknown, used or expired token or a short password.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    let user_id = AuthService::new(state.pool())
        .reset_password(&body.token, &body.password)
        .await?;
    tracing::info!(user_id = %user_id, "Password reset completed");
    Ok(Json(json!({ "message": "Password has been reset" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_defaults() {
        let body: RegisterRequest = serde_json::from_value(json!({
            "email": "buyer@example.com",
            "password": "correct horse",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }))
        .unwrap();
        assert!(body.role.is_none());
        assert!(body.seller.is_none());
        assert!(body.address.is_none());
    }

    #[test]
    fn test_register_request_with_seller() {
        let body: RegisterRequest = serde_json::from_value(json!({
            "email": "seller@example.com",
            "password": "correct horse",
            "first_name": "Grace",
            "last_name": "Hopper",
            "role": "seller",
            "seller": {"business_name": "Hopper Gems"}
        }))
        .unwrap();
        assert_eq!(body.role, Some(UserRole::Seller));
        assert_eq!(body.seller.unwrap().business_name, "Hopper Gems");
    }
}
