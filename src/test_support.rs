//! Shared fixtures for unit and router tests.

use std::sync::Arc;

use axum::{body::Body, http::Request, http::StatusCode, Router};
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{CreateUser, Role, User, UserRepository};
use crate::routes;
use crate::services::auth::AuthService;
use crate::services::email::LogEmailSender;
use crate::AppState;

/// Password of every account created by [`seed_user`].
pub const SEED_PASSWORD: &str = "Seed-password1";

/// Fresh in-memory database with migrations applied.
pub async fn test_state() -> Arc<AppState> {
    test_state_with(Config::default()).await
}

pub async fn test_state_with(mut config: Config) -> Arc<AppState> {
    config.jwt.secret = "test-secret".to_string();
    config.tokens.bcrypt_cost = 4;

    // A single connection that never expires keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    Arc::new(AppState {
        db: pool,
        config,
        email: Arc::new(LogEmailSender),
    })
}

/// Create an unverified account whose name is the local part of `email`.
pub async fn seed_user(state: &Arc<AppState>, email: &str, role: Role) -> User {
    let password_hash = AuthService::hash_password(state, SEED_PASSWORD)
        .await
        .expect("hash");
    let name = email.split('@').next().unwrap_or(email).to_string();

    UserRepository::create(
        &state.db,
        CreateUser {
            email: email.to_string(),
            name,
            role,
            password_hash,
            email_verified: false,
        },
    )
    .await
    .expect("seed user")
}

pub fn bearer(state: &Arc<AppState>, user: &User) -> String {
    AuthService::create_jwt(state, &user.id).expect("jwt").0
}

/// The application router without the rate limiter (tests have no peer address).
pub fn test_app(state: Arc<AppState>) -> Router {
    crate::app(state, routes::auth::router())
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    if body.is_null() {
        builder.body(Body::empty()).expect("request")
    } else {
        builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }
}

/// Send one request and decode the JSON body (`Null` when empty).
pub async fn call(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();

    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}
