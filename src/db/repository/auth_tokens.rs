use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{AuthToken, TokenKind};
use crate::error::{AppError, AppResult};

// ============================================================================
// Auth Token Repository
// ============================================================================

fn map_token(r: &SqliteRow) -> AuthToken {
    AuthToken {
        id: r.get("id"),
        user_id: r.get("user_id"),
        expires_at: r.get("expires_at"),
    }
}

pub struct AuthTokenRepository;

impl AuthTokenRepository {
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        kind: TokenKind,
        token_hash: &str,
        expires_at: chrono::NaiveDateTime,
    ) -> AppResult<()> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO auth_tokens (id, user_id, kind, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(token_hash)
        .bind(expires_at)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Look up a token by its hash and kind. Expiry is checked by the caller.
    pub async fn find_by_hash(
        pool: &SqlitePool,
        kind: TokenKind,
        token_hash: &str,
    ) -> AppResult<Option<AuthToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, expires_at
            FROM auth_tokens
            WHERE token_hash = ? AND kind = ?
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.as_ref().map(map_token))
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Drop every outstanding token of one kind for a user.
    pub async fn delete_for_user(pool: &SqlitePool, user_id: &str, kind: TokenKind) -> AppResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE user_id = ? AND kind = ?")
            .bind(user_id)
            .bind(kind.as_str())
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
