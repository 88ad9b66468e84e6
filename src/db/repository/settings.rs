use std::collections::HashMap;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::db::models::{Setting, SettingValue};
use crate::error::{AppError, AppResult};

// ============================================================================
// Settings Repository
// ============================================================================

/// Decode a row into a typed setting. Rows whose payload does not match the
/// declared data type are reported and treated as absent.
fn map_setting(r: &SqliteRow) -> Option<Setting> {
    let name: String = r.get("name");
    let data_type: String = r.get("data_type");
    let raw: String = r.get("value");

    match SettingValue::decode(&data_type, &raw) {
        Some(value) => Some(Setting { name, value }),
        None => {
            tracing::warn!(
                "Ignoring setting '{}': value does not match declared type '{}'",
                name,
                data_type
            );
            None
        }
    }
}

pub struct SettingRepository;

impl SettingRepository {
    /// Read several settings at once, keyed by name. Missing or undecodable
    /// settings are simply absent from the map.
    pub async fn get_many(
        pool: &SqlitePool,
        names: &[&str],
    ) -> AppResult<HashMap<String, SettingValue>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            r#"
            SELECT name, data_type, value
            FROM settings
            WHERE name IN ({})
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for name in names {
            query = query.bind(*name);
        }

        let rows = query.fetch_all(pool).await.map_err(AppError::Database)?;

        Ok(rows
            .iter()
            .filter_map(map_setting)
            .map(|s| (s.name, s.value))
            .collect())
    }

    /// Insert or replace a setting (last write wins). Takes any executor so
    /// several writes can share one transaction.
    pub async fn upsert<'e, E>(
        executor: E,
        name: &str,
        value: &SettingValue,
        updated_by: Option<&str>,
    ) -> AppResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO settings (name, data_type, value, updated_by, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                data_type = excluded.data_type,
                value = excluded.value,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value.data_type().as_str())
        .bind(value.encode())
        .bind(updated_by)
        .bind(now)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, name: &str) -> AppResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM settings WHERE name = ?")
            .bind(name)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
