//! Account administration.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{UserId, UserRole};

use crate::db::{Pagination, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireSuperAdmin};
use crate::models::{CurrentUser, Page, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_admin_role")]
    pub role: UserRole,
}

const fn default_admin_role() -> UserRole {
    UserRole::Admin
}

fn not_self(actor: &CurrentUser, target: UserId, action: &str) -> Result<()> {
    if actor.id == target {
        return Err(AppError::BadRequest(format!("You cannot {action} your own account")));
    }
    Ok(())
}

/// Whether `actor` may change the active flag of an account with `target` role.
fn may_manage(actor: UserRole, target: UserRole) -> bool {
    !target.is_admin() || actor == UserRole::SuperAdmin
}

/// Accounts, newest first, filtered by role and a name/email search.
///
/// # Errors
///
/// 500 if the query fails.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<User>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let (items, total) = UserRepository::new(state.pool())
        .list(query.role, search, pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// Activate or deactivate an account.
///
/// # Errors
///
/// 400 for the caller's own account, 403 when a plain admin targets an admin,
/// 404 for an unknown user.
#[instrument(skip(state, body), fields(admin_id = %admin.id, is_active = body.is_active))]
pub async fn set_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<User>> {
    let id = UserId::new(id);
    not_self(&admin, id, "change the status of")?;

    let users = UserRepository::new(state.pool());
    let target = users
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if !may_manage(admin.role, target.role) {
        return Err(AppError::Forbidden(
            "Only a super admin can change admin accounts".to_string(),
        ));
    }

    let user = users.set_active(id, body.is_active).await?;
    tracing::info!(user_id = %user.id, "User status changed");
    Ok(Json(user))
}

/// Change an account's role.
///
/// # Errors
///
/// 400 for the caller's own account, 404 for an unknown user.
#[instrument(skip(state, body), fields(admin_id = %admin.id, role = %body.role))]
pub async fn set_role(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>> {
    let id = UserId::new(id);
    not_self(&admin, id, "change the role of")?;
    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?;
    tracing::info!(user_id = %user.id, "User role changed");
    Ok(Json(user))
}

/// Delete an account.
///
/// # Errors
///
/// 400 for the caller's own account, 404 for an unknown user, 409 when the
/// account still has orders or listings.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let id = UserId::new(id);
    not_self(&admin, id, "delete")?;
    UserRepository::new(state.pool()).delete(id).await?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Create an admin or super admin.
///
/// # Errors
///
/// 400 for a non-admin role or invalid credentials, 409 for a taken email.
#[instrument(skip(state, body), fields(admin_id = %admin.id, role = %body.role))]
pub async fn create_admin(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .create_admin(
            &body.email,
            &body.password,
            body.first_name.trim(),
            body.last_name.trim(),
            body.role,
        )
        .await?;
    tracing::info!(user_id = %user.id, "Admin account created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_only_super_admin_manages_admins() {
        assert!(may_manage(UserRole::Admin, UserRole::Buyer));
        assert!(may_manage(UserRole::Admin, UserRole::Seller));
        assert!(!may_manage(UserRole::Admin, UserRole::Admin));
        assert!(!may_manage(UserRole::Admin, UserRole::SuperAdmin));
        assert!(may_manage(UserRole::SuperAdmin, UserRole::Admin));
    }

    #[test]
    fn test_not_self() {
        let actor = CurrentUser {
            id: UserId::new(7),
            email: "ops@example.com".to_string(),
            role: UserRole::Admin,
        };
        assert!(not_self(&actor, UserId::new(7), "delete").is_err());
        assert!(not_self(&actor, UserId::new(8), "delete").is_ok());
    }

    #[test]
    fn test_create_admin_role_defaults_to_admin() {
        let body: CreateAdminRequest = serde_json::from_value(json!({
            "email": "ops@example.com",
            "password": "longenough",
            "first_name": "Ops",
            "last_name": "Team"
        }))
        .unwrap();
        assert_eq!(body.role, UserRole::Admin);
    }
}
