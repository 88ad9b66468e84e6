use std::sync::Arc;

use axum::{http::HeaderMap, routing::get, Router};

use crate::i18n;
use crate::AppState;

pub mod account;
pub mod auth;
pub mod health;
pub mod settings;
pub mod users;

/// All routes except `/api/auth`, which `main` mounts behind the rate limiter.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/account", account::router())
        .nest("/api/users", users::router())
        .nest("/api/settings", settings::router())
}

/// First supported language from `Accept-Language`, if any.
pub fn request_lang(headers: &HeaderMap) -> Option<String> {
    let header = headers
        .get(http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())?;

    header
        .split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim())
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .map(i18n::normalize_language)
        .find(|lang| i18n::is_supported_language(lang))
}
