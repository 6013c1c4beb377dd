//! Authentication extractors.
//!
//! Handlers take [`RequireAuth`] or [`RequireAdmin`] to demand a valid
//! `Authorization: Bearer <token>` header. The token is verified and the
//! account re-read from the database on every request, so deleted accounts and
//! revoked admin rights take effect immediately.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

const NO_TOKEN: &str = "Not authorized, no token";
const TOKEN_FAILED: &str = "Not authorized, token failed";
const NOT_ADMIN: &str = "Not authorized as an admin";

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     Json(PublicUser::from(user))
/// }
/// ```
pub struct RequireAuth(pub User);

/// Extractor that requires a logged-in admin.
pub struct RequireAdmin(pub User);

/// Pull the token out of a `Bearer` authorization header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| AppError::Unauthorized(NO_TOKEN.to_string()))?;

        let user_id = state
            .tokens()
            .verify(token)
            .map_err(|_| AppError::Unauthorized(TOKEN_FAILED.to_string()))?;

        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(TOKEN_FAILED.to_string()))?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        tracing::Span::current().record("user_id", user.id.as_i32());

        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err(AppError::Unauthorized(NOT_ADMIN.to_string()));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/profile");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap_or_default().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
