//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use eshop_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{User, UserAddress};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, is_verified, \
     verification_token, password_reset_token, password_reset_expires, \
     two_factor_code, two_factor_expires, \
     shipping_address, shipping_city, shipping_postal_code, \
     created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    password_hash: String,
    is_admin: bool,
    is_verified: bool,
    verification_token: Option<String>,
    password_reset_token: Option<String>,
    password_reset_expires: Option<DateTime<Utc>>,
    two_factor_code: Option<String>,
    two_factor_expires: Option<DateTime<Utc>>,
    shipping_address: Option<String>,
    shipping_city: Option<String>,
    shipping_postal_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let shipping_address = if row.shipping_address.is_some()
            || row.shipping_city.is_some()
            || row.shipping_postal_code.is_some()
        {
            Some(UserAddress {
                address: row.shipping_address,
                city: row.shipping_city,
                postal_code: row.shipping_postal_code,
            })
        } else {
            None
        };

        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            email,
            password_hash: row.password_hash,
            is_admin: row.is_admin,
            is_verified: row.is_verified,
            verification_token: row.verification_token,
            password_reset_token: row.password_reset_token,
            password_reset_expires: row.password_reset_expires,
            two_factor_code: row.two_factor_code,
            two_factor_expires: row.two_factor_expires,
            shipping_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Changes applied by a profile update. `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a Email>,
    pub password_hash: Option<&'a str>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        condition: &str,
        bind: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {condition}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(bind)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_where("email = $1", email.as_str()).await
    }

    /// Get the user holding an email verification token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_where("verification_token = $1", token).await
    }

    /// Get the user holding an unexpired password reset token (by its hash).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_active_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_where(
            "password_reset_token = $1 AND password_reset_expires > NOW()",
            token_hash,
        )
        .await
    }

    /// Get a user by email, only if they have an unexpired two-factor code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email_with_active_two_factor(
        &self,
        email: &Email,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_where(
            "email = $1 AND two_factor_code IS NOT NULL AND two_factor_expires > NOW()",
            email.as_str(),
        )
        .await
    }

    /// List every user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Count all users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Create an unverified user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &str,
        email: &Email,
        password_hash: &str,
        verification_token: &str,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, verification_token) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(verification_token)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "email already exists"))?;

        row.try_into()
    }

    /// Delete a user. Their cart goes with them; orders and products keep a
    /// null owner.
    ///
    /// # Returns
    ///
    /// Returns `true` if the user was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a user's email as verified and consume the verification token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn mark_verified(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users \
             SET is_verified = TRUE, verification_token = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Store (or clear, with `None`) a hashed password reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_password_reset(
        &self,
        id: UserId,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> Result<(), RepositoryError> {
        let (hash, expires) = token.unzip();
        let result = sqlx::query(
            "UPDATE users \
             SET password_reset_token = $2, password_reset_expires = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(expires)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Replace the password and consume any pending reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn reset_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users \
             SET password_hash = $2, password_reset_token = NULL, \
                 password_reset_expires = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Store (or clear, with `None`) a hashed admin login code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_two_factor(
        &self,
        id: UserId,
        code: Option<(&str, DateTime<Utc>)>,
    ) -> Result<(), RepositoryError> {
        let (hash, expires) = code.unzip();
        let result = sqlx::query(
            "UPDATE users \
             SET two_factor_code = $2, two_factor_expires = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(expires)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a profile update and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new email belongs to another account.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate<'_>,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 password_hash = COALESCE($4, password_hash), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(update.username)
            .bind(update.email.map(Email::as_str))
            .bind(update.password_hash)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "email already exists"))?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Grant admin rights (and mark verified) by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has that email.
    pub async fn promote_to_admin(&self, email: &Email) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users \
             SET is_admin = TRUE, is_verified = TRUE, verification_token = NULL, updated_at = NOW() \
             WHERE email = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Get the first admin account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn first_admin(&self) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_admin ORDER BY created_at ASC LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}
