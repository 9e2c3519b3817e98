//! SQLite-backed persistence for session rows, so sessions can be
//! restored (cookies and all) across process restarts.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use flaregate_core::Cookie;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub name: String,
    pub user_agent: Option<String>,
    pub proxy_url: Option<String>,
    pub cookies_json: String,
    pub request_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl SessionRow {
    pub fn cookies(&self) -> Vec<Cookie> {
        serde_json::from_str(&self.cookies_json).unwrap_or_default()
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                name TEXT PRIMARY KEY,
                user_agent TEXT,
                proxy_url TEXT,
                cookies_json TEXT NOT NULL DEFAULT '[]',
                request_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn upsert(&self, row: &SessionRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (name, user_agent, proxy_url, cookies_json, request_count, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                user_agent = excluded.user_agent,
                proxy_url = excluded.proxy_url,
                cookies_json = excluded.cookies_json,
                request_count = excluded.request_count,
                last_used_at = excluded.last_used_at
            "#,
        )
        .bind(&row.name)
        .bind(&row.user_agent)
        .bind(&row.proxy_url)
        .bind(&row.cookies_json)
        .bind(row.request_count)
        .bind(row.created_at.to_rfc3339())
        .bind(row.last_used_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_used_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flaregate_core::SameSite;

    #[tokio::test]
    async fn cookies_round_trip_through_persisted_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("sessions.sqlite3");
        let store = SqliteStore::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .expect("connect");

        let cookies = vec![Cookie {
            name: "sid".to_string(),
            value: "abc123".to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            expires: Some(1893456000.0),
            http_only: Some(true),
            secure: Some(true),
            same_site: Some(SameSite::Lax),
        }];

        let now = Utc::now();
        store
            .upsert(&SessionRow {
                name: "alice".to_string(),
                user_agent: Some("flaregate-test/1.0".to_string()),
                proxy_url: None,
                cookies_json: serde_json::to_string(&cookies).unwrap(),
                request_count: 3,
                created_at: now,
                last_used_at: now,
            })
            .await
            .expect("upsert");

        let row = store.get("alice").await.expect("get").expect("row present");
        let restored = row.cookies();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].name, "sid");
        assert_eq!(restored[0].value, "abc123");
        assert!(matches!(restored[0].same_site, Some(SameSite::Lax)));

        store.delete("alice").await.expect("delete");
        assert!(store.get("alice").await.expect("get").is_none());
    }
}
