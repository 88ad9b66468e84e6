use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::User;
use crate::error::AppResult;
use crate::i18n;
use crate::routes::auth::AuthUser;
use crate::services::users::{CreateUserRequest, UpdateUserRequest, UserService};
use crate::AppState;

/// Router for user management (owner and admins)
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Matches email or name; empty lists everyone
    pub q: Option<String>,
    /// Maximum number of results to return
    pub limit: Option<i64>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    let users = UserService::list(&state, &user, query.q.as_deref(), query.limit).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let created = UserService::create(&state, &user, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(UserService::get(&state, &user, &id).await?))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(UserService::update(&state, &user, &id, request).await?))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    UserService::delete(&state, &user, &id).await?;
    Ok(Json(serde_json::json!({
        "message": i18n::tr(user.lang.as_deref(), "user.deleted", None)
    })))
}
