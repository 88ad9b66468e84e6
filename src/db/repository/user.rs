use chrono::Utc;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

const USER_COLUMNS: &str = r#"
    id, email, name, role, password_hash, email_verified, lang,
    created_at, updated_at
"#;

fn map_user(r: &SqliteRow) -> User {
    let role: String = r.get("role");
    let id: String = r.get("id");
    let role = Role::parse(&role).unwrap_or_else(|| {
        tracing::warn!("User {} has unknown role '{}', treating as user", id, role);
        Role::User
    });

    User {
        id,
        email: r.get("email"),
        name: r.get("name"),
        role,
        password_hash: r.get("password_hash"),
        email_verified: r.get("email_verified"),
        lang: r.get("lang"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// Escape `LIKE` wildcards so user input only matches literally (`ESCAPE '\'`).
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.as_ref().map(map_user))
    }

    /// Emails are stored lowercased; callers pass the normalized form.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.as_ref().map(map_user))
    }

    pub async fn find_owner(pool: &SqlitePool) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = 'owner' ORDER BY created_at ASC LIMIT 1",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.as_ref().map(map_user))
    }

    /// Search users by email or name (case-insensitive).
    /// An empty query lists everyone. Returns up to `limit` results ordered by email.
    pub async fn search(pool: &SqlitePool, query: &str, limit: i64) -> AppResult<Vec<User>> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));

        let sql = format!(
            r#"
            SELECT {}
            FROM users
            WHERE LOWER(email) LIKE ? ESCAPE '\' OR LOWER(name) LIKE ? ESCAPE '\'
            ORDER BY email ASC
            LIMIT ?
            "#,
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(rows.iter().map(map_user).collect())
    }

    pub async fn create(pool: &SqlitePool, new_user: CreateUser) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            INSERT INTO users (
                id, email, name, role, password_hash, email_verified, lang,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&id)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(new_user.role.as_str())
            .bind(&new_user.password_hash)
            .bind(new_user.email_verified)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::Conflict(crate::i18n::t("conflict.email_taken"))
                }
                _ => AppError::Database(e),
            })?;

        Ok(map_user(&row))
    }

    pub async fn update_profile(
        pool: &SqlitePool,
        user_id: &str,
        name: &str,
        lang: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE users SET name = ?, lang = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(lang)
            .bind(now)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn update_role(pool: &SqlitePool, user_id: &str, role: Role) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(now)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn update_password_hash(
        pool: &SqlitePool,
        user_id: &str,
        password_hash: &str,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn set_email_verified(pool: &SqlitePool, user_id: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE users SET email_verified = 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, user_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
