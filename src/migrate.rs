use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent — safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            subject TEXT,
            filename TEXT NOT NULL,
            category TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'uploaded',
            error TEXT,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fragments (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            frag_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            hash TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            UNIQUE(document_id, frag_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fragment_vectors (
            fragment_id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (fragment_id) REFERENCES fragments(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One summary per document; regeneration upserts.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            document_id TEXT PRIMARY KEY,
            key_findings_json TEXT NOT NULL,
            reasoning_steps_json TEXT NOT NULL,
            recommendations_json TEXT NOT NULL,
            full_summary TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fragments_document_id ON fragments(document_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fragment_vectors_document_id ON fragment_vectors(document_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)")
        .execute(pool)
        .await?;

    Ok(())
}
