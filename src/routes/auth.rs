use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::User;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::routes::request_lang;
use crate::services::auth::{AuthService, RegisterRequest, SessionResponse};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
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

// ============================================================================
// Handlers
// ============================================================================

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let session = AuthService::login(&state, &request.email, &request.password).await?;
    Ok(Json(session))
}

async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut request): Json<RegisterRequest>,
) -> AppResult<Json<SessionResponse>> {
    if request.lang.is_none() {
        request.lang = request_lang(&headers);
    }
    let session = AuthService::register(&state, request).await?;
    Ok(Json(session))
}

/// Sessions are stateless JWTs; the client drops its token.
async fn logout(headers: HeaderMap) -> Json<serde_json::Value> {
    let lang = request_lang(&headers);
    Json(serde_json::json!({ "message": i18n::tr(lang.as_deref(), "auth.logged_out", None) }))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user = AuthService::verify_email(&state, &request.token).await?;
    Ok(Json(serde_json::json!({
        "message": i18n::tr(user.lang.as_deref(), "auth.email_verified", None),
        "user": user,
    })))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    AuthService::request_password_reset(&state, &request.email).await?;
    let lang = request_lang(&headers);
    Ok(Json(serde_json::json!({
        "message": i18n::tr(lang.as_deref(), "auth.reset_email_sent", None)
    })))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let lang = request_lang(&headers);
    AuthService::reset_password(&state, &request.token, &request.password, lang.as_deref())
        .await?;
    Ok(Json(serde_json::json!({
        "message": i18n::tr(lang.as_deref(), "auth.password_reset", None)
    })))
}

// ============================================================================
// Extractor
// ============================================================================

/// Extractor for authenticated user
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        let token = match auth_header.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => auth_header[7..].trim(),
            _ => {
                tracing::debug!("Authorization header doesn't start with 'Bearer '");
                return Err(AppError::Unauthorized);
            }
        };
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let user = AuthService::get_user_from_token(state, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                e
            })?;

        tracing::debug!("Authenticated user: {}", user.id);
        Ok(AuthUser(user))
    }
}
