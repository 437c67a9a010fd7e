//! Authentication service.
//!
//! Password registration and login, password changes and the one-time-token
//! password reset flow. Tokens are issued by [`jwt::JwtKeys`].

mod error;
pub mod jwt;

pub use error::AuthError;
pub use jwt::{Claims, JwtKeys};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use gemvault_core::{Email, UserId, UserRole};

use crate::db::users::{NewSellerProfile, NewUser};
use crate::db::{PasswordResetRepository, RepositoryError, UserRepository};
use crate::models::{AddressInput, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Lifetime of a password reset token.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Self-service registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub seller: Option<NewSellerProfile>,
    pub address: Option<AddressInput>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    resets: PasswordResetRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            resets: PasswordResetRepository::new(pool),
        }
    }

    /// Register a buyer or seller account.
    ///
    /// Sellers get a pending seller profile; a supplied address becomes the
    /// default shipping address. All rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::InvalidInput` for admin roles, missing names, a seller
    /// without business name, or an incomplete address.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        validate_registration(&registration)?;

        let password_hash = hash_password(&registration.password)?;
        let seller = match registration.role {
            UserRole::Seller => registration.seller,
            _ => None,
        };

        let new_user = NewUser {
            email,
            password_hash,
            first_name: registration.first_name.trim().to_owned(),
            last_name: registration.last_name.trim().to_owned(),
            phone: registration.phone,
            role: registration.role,
            seller,
            address: registration.address,
        };

        self.users.register(&new_user).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })
    }

    /// Create an admin or super admin account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` if `role` is not an admin role.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        if !role.is_admin() {
            return Err(AuthError::InvalidInput(
                "role must be admin or super_admin".to_string(),
            ));
        }
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(&email, &password_hash, first_name, last_name, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account was deactivated.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    /// Change a password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self
            .users
            .get_password_hash_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(current, &hash)?;
        validate_password(new)?;

        let new_hash = hash_password(new)?;
        self.users.update_password(user_id, &new_hash).await?;
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Returns the user and the plain token to send them, or `None` when no
    /// active account has this email. Only the token's hash is stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.users.get_by_email(&email).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.resets
            .create(user.id, &hash_reset_token(&token), expires_at)
            .await?;

        Ok(Some((user, token)))
    }

    /// Complete a password reset with a token from [`Self::request_password_reset`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the new password is too short.
    /// Returns `AuthError::InvalidResetToken` if the token is unknown, used or expired.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<UserId, AuthError> {
        validate_password(new_password)?;
        let new_hash = hash_password(new_password)?;

        self.resets
            .redeem(&hash_reset_token(token.trim()), &new_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }
}

/// Check registration fields that the database would otherwise accept.
fn validate_registration(registration: &Registration) -> Result<(), AuthError> {
    if !registration.role.is_self_assignable() {
        return Err(AuthError::InvalidInput(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }
    if registration.first_name.trim().is_empty() || registration.last_name.trim().is_empty() {
        return Err(AuthError::InvalidInput(
            "first_name and last_name are required".to_string(),
        ));
    }
    if registration.role == UserRole::Seller
        && registration
            .seller
            .as_ref()
            .is_none_or(|s| s.business_name.trim().is_empty())
    {
        return Err(AuthError::InvalidInput(
            "Seller accounts require seller.business_name".to_string(),
        ));
    }
    if let Some(address) = &registration.address {
        let missing = address.missing_fields();
        if !missing.is_empty() {
            return Err(AuthError::InvalidInput(format!(
                "address is missing required fields: {}",
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// 32 random bytes, hex encoded.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a reset token, hex encoded. This is what the database stores.
fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration(role: UserRole) -> Registration {
        Registration {
            email: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            role,
            seller: None,
            address: None,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_against_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_admin_cannot_self_register() {
        for role in [UserRole::Admin, UserRole::SuperAdmin] {
            assert!(matches!(
                validate_registration(&registration(role)),
                Err(AuthError::InvalidInput(_))
            ));
        }
        assert!(validate_registration(&registration(UserRole::Buyer)).is_ok());
    }

    #[test]
    fn test_seller_requires_business_name() {
        let mut reg = registration(UserRole::Seller);
        assert!(validate_registration(&reg).is_err());

        reg.seller = Some(NewSellerProfile {
            business_name: "  ".to_string(),
            business_description: None,
            business_phone: None,
            business_address: None,
        });
        assert!(validate_registration(&reg).is_err());

        reg.seller = Some(NewSellerProfile {
            business_name: "Ceylon Gems".to_string(),
            business_description: None,
            business_phone: None,
            business_address: None,
        });
        assert!(validate_registration(&reg).is_ok());
    }

    #[test]
    fn test_incomplete_address_rejected() {
        let mut reg = registration(UserRole::Buyer);
        reg.address = Some(AddressInput {
            full_name: "Ada Lovelace".to_string(),
            ..AddressInput::default()
        });
        let err = validate_registration(&reg).unwrap_err();
        assert!(err.to_string().contains("address_line1"));
    }

    #[test]
    fn test_reset_token_shape() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_reset_token());

        let hash = hash_reset_token(&token);
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, token);
        assert_eq!(hash, hash_reset_token(&token));
    }
}
