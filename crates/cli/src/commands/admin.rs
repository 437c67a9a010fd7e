//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! GEMVAULT_ADMIN_PASSWORD=... gv-cli admin create -e ops@example.com -f Ada -l Admin -r super_admin
//! ```
//!
//! The password is read from the environment so it never lands in shell history.

use gemvault_api::services::auth::{AuthError, AuthService};
use gemvault_core::{UserId, UserRole};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::{CommandError, connect};

const PASSWORD_VAR: &str = "GEMVAULT_ADMIN_PASSWORD";

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

fn parse_admin_role(role: &str) -> Result<UserRole, AdminError> {
    role.parse::<UserRole>()
        .ok()
        .filter(UserRole::is_admin)
        .ok_or_else(|| AdminError::InvalidRole(role.to_owned()))
}

/// Create a new admin user.
///
/// # Returns
///
/// The ID of the created admin user.
///
/// # Errors
///
/// Returns `AdminError` for an invalid role, a missing password, a weak
/// password or a taken email.
pub async fn create_user(
    email: &str,
    first_name: &str,
    last_name: &str,
    role: &str,
) -> Result<UserId, AdminError> {
    let role = parse_admin_role(role)?;

    dotenvy::dotenv().ok();
    let password = std::env::var(PASSWORD_VAR)
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar(PASSWORD_VAR))?;

    let pool = connect().await?;

    tracing::info!("Creating admin user: {} ({})", email, role);
    let user = AuthService::new(&pool)
        .create_admin(email, password.expose_secret(), first_name, last_name, role)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_role() {
        assert!(matches!(parse_admin_role("admin"), Ok(UserRole::Admin)));
        assert!(matches!(
            parse_admin_role("super_admin"),
            Ok(UserRole::SuperAdmin)
        ));
        assert!(matches!(
            parse_admin_role("seller"),
            Err(AdminError::InvalidRole(_))
        ));
        assert!(parse_admin_role("root").is_err());
    }
}
