//! Account route handlers: registration, login flows, profile and cart.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header::LOCATION},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use eshop_core::{Email, UserId};

use super::{MessageResponse, parse_id};
use crate::db::users::ProfileUpdate;
use crate::db::{CartRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::cart::merge_guest_cart;
use crate::models::{CartItem, CartItemInput, GuestCartItem, PublicUser, User};
use crate::services::auth::{
    self, AuthError, AuthService, ONE_TIME_CODE_TTL_MINUTES, validate_registration,
};
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub guest_cart: Vec<GuestCartItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminVerifyRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub two_factor_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCartRequest {
    #[serde(default)]
    pub cart_items: Vec<CartItemInput>,
}

/// The account summary every auth response starts with.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub is_admin: bool,
}

impl From<&User> for ProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub cart: Vec<CartItem>,
    pub token: String,
}

const RESET_REQUESTED: &str =
    "If an account with that email exists, a password reset link has been sent.";

// =============================================================================
// Registration & Verification
// =============================================================================

/// `POST /api/users/register`
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response> {
    let errors = validate_registration(&req.username, &req.email, &req.password);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let email = Email::parse(&req.email)
        .map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?;

    let auth = AuthService::new(state.pool());
    let (user, token) = auth.register(&req.username, &email, &req.password).await?;

    let link = format!("{}/api/users/verify/{token}", state.config().public_url);
    if let Err(e) = state
        .email()
        .send_verification(&user.email, &user.username, &link)
        .await
    {
        tracing::error!(user_id = %user.id, error = %e, "Verification email failed, discarding account");
        auth.discard_registration(user.id).await?;
        return Err(e.into());
    }

    tracing::info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "A verification email has been sent. Please check your inbox.",
        )),
    )
        .into_response())
}

/// `GET /api/users/verify/{token}`
///
/// Opened from the email, so answers are a redirect or a small HTML page.
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response> {
    match AuthService::new(state.pool()).verify_email(&token).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Email verified");
            let target = format!(
                "{}/verification-success",
                state.config().frontend.store_url.trim_end_matches('/')
            );
            Ok((StatusCode::FOUND, [(LOCATION, target)]).into_response())
        }
        Err(AuthError::InvalidVerificationToken) => Ok((
            StatusCode::BAD_REQUEST,
            Html("<h1>This verification link is invalid or has already been used.</h1>"),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Login
// =============================================================================

/// `POST /api/users/login`
///
/// A non-empty guest cart is merged into the stored cart and saved.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = AuthService::new(state.pool())
        .login_with_password(&req.email, &req.password)
        .await?;

    let carts = CartRepository::new(state.pool());
    let mut cart = carts.get(user.id).await?;

    if !req.guest_cart.is_empty() {
        let ids: Vec<_> = req
            .guest_cart
            .iter()
            .filter_map(GuestCartItem::product_id)
            .collect();
        let catalog: HashMap<_, _> = ProductRepository::new(state.pool())
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        cart = merge_guest_cart(cart, &req.guest_cart, &catalog);
        carts.replace(user.id, &cart).await?;
    }

    tracing::info!(user_id = %user.id, cart_lines = cart.len(), "User logged in");
    Ok(Json(LoginResponse {
        profile: ProfileResponse::from(&user),
        cart,
        token: state.tokens().sign(user.id),
    }))
}

/// `POST /api/users/admin/login`: check the password, email a one-time code.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<MessageResponse>> {
    let (user, code) = AuthService::new(state.pool())
        .start_admin_login(&req.email, &req.password)
        .await?;

    state
        .email()
        .send_two_factor_code(&user.email, &code, ONE_TIME_CODE_TTL_MINUTES)
        .await?;

    Ok(Json(MessageResponse::new(
        "A verification code has been sent to your email",
    )))
}

/// `POST /api/users/admin/verify`: check the one-time code, issue a token.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn admin_verify(
    State(state): State<AppState>,
    Json(req): Json<AdminVerifyRequest>,
) -> Result<Json<TokenResponse>> {
    let user = AuthService::new(state.pool())
        .finish_admin_login(&req.email, &req.two_factor_code)
        .await?;

    tracing::info!(user_id = %user.id, "Admin logged in");
    Ok(Json(TokenResponse {
        profile: ProfileResponse::from(&user),
        token: state.tokens().sign(user.id),
    }))
}

// =============================================================================
// Password Reset
// =============================================================================

/// `POST /api/users/forgotpassword`
///
/// Answers the same whether or not the email has an account.
#[instrument(skip(state, req))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let auth = AuthService::new(state.pool());
    let Some((user, token)) = auth.start_password_reset(&req.email).await? else {
        return Ok(Json(MessageResponse::new(RESET_REQUESTED)));
    };

    let link = format!(
        "{}/reset-password/{token}",
        state.config().frontend.store_url.trim_end_matches('/')
    );
    if let Err(e) = state
        .email()
        .send_password_reset(&user.email, &user.username, &link, ONE_TIME_CODE_TTL_MINUTES)
        .await
    {
        tracing::error!(user_id = %user.id, error = %e, "Password reset email failed");
        auth.cancel_password_reset(user.id).await?;
        return Err(e.into());
    }

    Ok(Json(MessageResponse::new(RESET_REQUESTED)))
}

/// `PUT /api/users/resetpassword/{token}`
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    AuthService::new(state.pool())
        .reset_password(&token, &req.password)
        .await?;

    Ok(Json(MessageResponse::new(
        "Password has been reset. You can now log in with your new password.",
    )))
}

// =============================================================================
// Profile
// =============================================================================

/// `GET /api/users/profile`
pub async fn get_profile(RequireAuth(user): RequireAuth) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(&user))
}

/// `PUT /api/users/profile`
///
/// Empty or missing fields are left unchanged. Returns a fresh token.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<TokenResponse>> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let username = non_empty(&req.username);
    let email = non_empty(&req.email)
        .map(|e| Email::parse(&e))
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?;
    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => {
            auth::validate_password(password)?;
            Some(auth::hash_password(password)?)
        }
        None => None,
    };

    let updated = UserRepository::new(state.pool())
        .update_profile(
            user.id,
            &ProfileUpdate {
                username: username.as_deref(),
                email: email.as_ref(),
                password_hash: password_hash.as_deref(),
            },
        )
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::Auth(AuthError::UserAlreadyExists),
            RepositoryError::NotFound => AppError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;

    Ok(Json(TokenResponse {
        profile: ProfileResponse::from(&updated),
        token: state.tokens().sign(updated.id),
    }))
}

/// `DELETE /api/users/profile`
///
/// Refused while any of the user's orders is undelivered.
pub async fn delete_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MessageResponse>> {
    if OrderRepository::new(state.pool())
        .has_undelivered(user.id)
        .await?
    {
        return Err(AppError::BadRequest(
            "Cannot delete an account with open orders".to_string(),
        ));
    }

    if !UserRepository::new(state.pool()).delete(user.id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %user.id, "User deleted own account");
    Ok(Json(MessageResponse::new("User account deleted successfully")))
}

// =============================================================================
// Cart
// =============================================================================

/// `GET /api/users/cart`
pub async fn get_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CartItem>>> {
    let cart = CartRepository::new(state.pool()).get(user.id).await?;
    Ok(Json(cart))
}

/// `POST /api/users/cart`: replace the whole cart.
///
/// Lines for products that no longer exist are dropped.
pub async fn save_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<SaveCartRequest>,
) -> Result<Json<Vec<CartItem>>> {
    let items = req
        .cart_items
        .into_iter()
        .map(CartItemInput::into_item)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(AppError::BadRequest)?;

    let ids: Vec<_> = items.iter().map(|item| item.product).collect();
    let existing: Vec<_> = ProductRepository::new(state.pool())
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    let (items, dropped): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| existing.contains(&item.product));
    if !dropped.is_empty() {
        tracing::warn!(user_id = %user.id, dropped = dropped.len(), "Dropped cart lines for missing products");
    }

    CartRepository::new(state.pool())
        .replace(user.id, &items)
        .await?;
    Ok(Json(items))
}

// =============================================================================
// Admin
// =============================================================================

/// `GET /api/users`
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<PublicUser>>> {
    let users = UserRepository::new(state.pool()).list_all().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

/// `GET /api/users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>> {
    let id: UserId = parse_id(&id, "User not found")?;
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}
