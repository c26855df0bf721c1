//! SQLite connection setup for the pipeline database.
//!
//! Everything lives in one file: documents, fragments, fragment vectors,
//! and summaries. WAL keeps reads (similarity scans, `get`) from blocking
//! behind the two writers — ingestion replacing a document's fragment set
//! and the orchestrator updating status and summaries.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DbConfig;

/// Open the pipeline database, creating the file and its parent directory
/// if missing. Connecting does not imply the schema exists — that is
/// [`crate::migrate::run_migrations`]'s job (`medsum init`).
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        // Concurrent regenerations contend on the summaries row; wait for
        // the lock instead of surfacing SQLITE_BUSY.
        .busy_timeout(Duration::from_secs(5));

    // Ingestion and summarization are the only writers, so a small pool is
    // enough headroom for the read-mostly commands alongside them.
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_nested_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let db = DbConfig {
            path: tmp.path().join("nested").join("dirs").join("medsum.sqlite"),
        };

        let pool = connect(&db).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
        pool.close().await;

        assert!(db.path.exists());
    }

    #[tokio::test]
    async fn test_connect_is_reopenable() {
        let tmp = TempDir::new().unwrap();
        let db = DbConfig {
            path: tmp.path().join("medsum.sqlite"),
        };

        let pool = connect(&db).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        pool.close().await;

        let pool = connect(&db).await.unwrap();
        sqlx::query("SELECT COUNT(*) FROM documents")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }
}
