//! Authentication service.
//!
//! Provides password login with email verification, the two-step admin login,
//! password reset, and the signed bearer tokens handed to the frontends.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use eshop_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::error::FieldError;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Lifetime of bearer tokens, in days.
pub const TOKEN_TTL_DAYS: i64 = 30;

/// Lifetime of password reset tokens and admin login codes, in minutes.
pub const ONE_TIME_CODE_TTL_MINUTES: i64 = 10;

type HmacSha256 = Hmac<Sha256>;

/// Authentication service.
///
/// Wraps the user repository with the credential checks for each login flow.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Create an unverified account.
    ///
    /// Returns the user and the token to put in the verification link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        username: &str,
        email: &Email,
        password: &str,
    ) -> Result<(User, String), AuthError> {
        if self.users.get_by_email(email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let token = generate_token_hex();

        let user = self
            .users
            .create(username.trim(), email, &password_hash, &token)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok((user, token))
    }

    /// Remove an account whose verification email could not be sent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn discard_registration(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.delete(user_id).await?;
        Ok(())
    }

    /// Consume an email verification token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidVerificationToken` if no account holds the token.
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_verification_token(token)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        self.users.mark_verified(user.id).await?;
        Ok(user)
    }

    // =========================================================================
    // Customer Login
    // =========================================================================

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::NotVerified` if the email was never confirmed.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.check_password(email, password).await?;

        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }
        Ok(user)
    }

    async fn check_password(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;
        Ok(user)
    }

    // =========================================================================
    // Admin Login (two steps)
    // =========================================================================

    /// First admin login step: check the password and issue a one-time code.
    ///
    /// Returns the admin and the plain code to email. Only its hash is stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidAdminCredentials` if the password is wrong or
    /// the account is not an admin.
    pub async fn start_admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, String), AuthError> {
        let user = self
            .check_password(email, password)
            .await
            .map_err(|e| match e {
                AuthError::InvalidCredentials => AuthError::InvalidAdminCredentials,
                other => other,
            })?;
        if !user.is_admin {
            return Err(AuthError::InvalidAdminCredentials);
        }

        let code = generate_two_factor_code();
        let code_hash = hash_password(&code)?;
        let expires = Utc::now() + Duration::minutes(ONE_TIME_CODE_TTL_MINUTES);
        self.users
            .set_two_factor(user.id, Some((&code_hash, expires)))
            .await?;

        Ok((user, code))
    }

    /// Second admin login step: check the emailed code and consume it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidTwoFactorCode` if there is no pending code,
    /// it expired, or it doesn't match.
    pub async fn finish_admin_login(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidTwoFactorCode)?;

        let user = self
            .users
            .get_by_email_with_active_two_factor(&email)
            .await?
            .ok_or(AuthError::InvalidTwoFactorCode)?;

        let stored = user
            .two_factor_code
            .as_deref()
            .ok_or(AuthError::InvalidTwoFactorCode)?;
        verify_password(code.trim(), stored).map_err(|_| AuthError::InvalidTwoFactorCode)?;

        self.users.set_two_factor(user.id, None).await?;
        Ok(user)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a password reset token.
    ///
    /// Returns `None` for unknown emails so callers can answer identically
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn start_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.users.get_by_email(&email).await? else {
            return Ok(None);
        };

        let token = generate_token_hex();
        let expires = Utc::now() + Duration::minutes(ONE_TIME_CODE_TTL_MINUTES);
        self.users
            .set_password_reset(user.id, Some((&hash_reset_token(&token), expires)))
            .await?;

        Ok(Some((user, token)))
    }

    /// Withdraw a reset token whose email could not be sent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn cancel_password_reset(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.set_password_reset(user_id, None).await?;
        Ok(())
    }

    /// Set a new password using an emailed reset token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::InvalidResetToken` if the token is unknown or expired.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;

        let user = self
            .users
            .get_by_active_reset_token(&hash_reset_token(token))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = hash_password(password)?;
        self.users.reset_password(user.id, &password_hash).await?;
        Ok(())
    }
}

// =============================================================================
// Bearer Tokens
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    exp: i64,
}

/// Signs and verifies the bearer tokens returned by the login endpoints.
///
/// A token is `base64url(claims json) "." base64url(hmac-sha256)`.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl TokenSigner {
    /// Create a signer from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the key is rejected by HMAC,
    /// which only happens for an empty secret.
    pub fn new(secret: &SecretString) -> Result<Self, AuthError> {
        let key = secret.expose_secret().as_bytes();
        if key.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    /// Issue a token for `user_id` valid for [`TOKEN_TTL_DAYS`].
    #[must_use]
    pub fn sign(&self, user_id: UserId) -> String {
        self.sign_at(user_id, Utc::now())
    }

    fn sign_at(&self, user_id: UserId, now: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: user_id.as_i32(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{payload}.{signature}")
    }

    /// Check a token's signature and expiry and return the user it names.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed, was not
    /// signed with this secret, or has expired.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(AuthError::InvalidToken)?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(UserId::new(claims.sub))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Check registration input, collecting every problem rather than the first.
#[must_use]
pub fn validate_registration(username: &str, email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if username.trim().is_empty() {
        errors.push(FieldError::new("username", "Username is required"));
    }
    if Email::parse(email).is_err() {
        errors.push(FieldError::new("email", "Please include a valid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::new(
            "password",
            format!("Please enter a password with {MIN_PASSWORD_LENGTH} or more characters"),
        ));
    }

    errors
}

/// Validate a new password.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password (or one-time code) with Argon2id.
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

/// Check a password against a stored Argon2 hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// 32 random bytes, hex encoded. Used for verification and reset links.
#[must_use]
pub fn generate_token_hex() -> String {
    let mut bytes = [0_u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The form a reset token is stored in.
#[must_use]
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a 6-digit admin login code.
#[must_use]
pub fn generate_two_factor_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}
