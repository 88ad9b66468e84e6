//! Initialization helpers for the application:
//! - database connection + migrations
//! - first-start owner account
//!
//! This module centralizes bits that would otherwise live in `main.rs`.

use std::{path::Path, sync::Arc};

use anyhow::Result;

use crate::config::Config;
use crate::db::{CreateUser, Role, UserRepository};
use crate::services::auth::AuthService;
use crate::services::users::UserService;
use crate::AppState;

/// Redact potentially sensitive information from a database URL before logging.
///
/// Attempts to parse the URL and remove userinfo (username:password) components.
/// Falls back to removing everything before '@' or returning "(redacted)".
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        let scheme = url.scheme();
        let host = url.host_str().unwrap_or("");
        let port_part = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let path = url.path();
        format!("{}://{}{}{}", scheme, host, port_part, path)
    } else {
        if let Some(at_pos) = db_url.find('@') {
            let without_creds = &db_url[at_pos + 1..];
            return format!("(redacted){}", without_creds);
        }
        "(redacted)".to_string()
    }
}

/// Initialize SQLite database connection and run migrations.
///
/// Creates the parent directory for the database file (if applicable),
/// opens a connection pool using `create_if_missing(true)` and runs migrations.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Create the owner account from `OWNER_EMAIL` / `OWNER_PASSWORD` when the
/// deployment has no owner yet. Does nothing once an owner exists.
///
/// The bootstrap password is not checked against the stored password policy;
/// on a fresh deployment the policy is still at its defaults.
pub async fn bootstrap_owner(state: &Arc<AppState>) -> Result<()> {
    if let Some(owner) = UserRepository::find_owner(&state.db).await? {
        tracing::debug!("Owner account {} already exists", owner.id);
        return Ok(());
    }

    let bootstrap = &state.config.bootstrap;
    let (Some(email), Some(password)) = (&bootstrap.owner_email, &bootstrap.owner_password) else {
        tracing::warn!("No owner account exists; set OWNER_EMAIL and OWNER_PASSWORD to create one");
        return Ok(());
    };

    let email = UserService::normalize_email(email)?;
    let name = UserService::normalize_name(&bootstrap.owner_name)?;

    if let Some(existing) = UserRepository::find_by_email(&state.db, &email).await? {
        UserRepository::update_role(&state.db, &existing.id, Role::Owner).await?;
        tracing::info!("Promoted existing account {} to owner", existing.id);
        return Ok(());
    }

    let password_hash = AuthService::hash_password(state, password).await?;
    let owner = UserRepository::create(
        &state.db,
        CreateUser {
            email,
            name,
            role: Role::Owner,
            password_hash,
            email_verified: true,
        },
    )
    .await?;

    tracing::info!("Created owner account {}", owner.id);
    Ok(())
}
