use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::routes::auth::AuthUser;
use crate::services::auth::AuthService;
use crate::services::users::UserService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_account).put(update_account))
        .route("/password", put(change_password))
        .route("/resend-verification", post(resend_verification))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn get_account(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateAccountRequest>,
) -> AppResult<Json<User>> {
    let name = match request.name {
        Some(name) => UserService::normalize_name(&name)?,
        None => user.name.clone(),
    };

    let lang = match request.lang {
        Some(lang) if lang.is_empty() => None,
        Some(lang) => {
            let normalized = i18n::normalize_language(&lang);
            if !i18n::is_supported_language(&normalized) {
                return Err(AppError::BadRequest(i18n::t_with(
                    "error.unsupported_language",
                    &[("lang", lang.as_str())],
                )));
            }
            Some(normalized)
        }
        None => user.lang.clone(),
    };

    UserRepository::update_profile(&state.db, &user.id, &name, lang.as_deref()).await?;

    let updated = UserRepository::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(i18n::t("not_found.user")))?;
    Ok(Json(updated))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    AuthService::change_password(&state, &user, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(serde_json::json!({
        "message": i18n::tr(user.lang.as_deref(), "account.password_changed", None)
    })))
}

async fn resend_verification(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let lang = user.lang.as_deref();
    if user.email_verified {
        return Err(AppError::BadRequest(i18n::tr(
            lang,
            "account.already_verified",
            None,
        )));
    }

    AuthService::send_verification(&state, &user).await?;
    Ok(Json(serde_json::json!({
        "message": i18n::tr(lang, "account.verification_sent", None)
    })))
}
