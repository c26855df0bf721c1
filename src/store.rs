//! Vector store and persistence layer.
//!
//! Owns the four persisted shapes: document rows, fragment rows (unique per
//! `(document_id, frag_index)`), fragment vectors, and summary rows (unique
//! per document). Fragments are written only as a full-document batch inside
//! one transaction; similarity queries are a brute-force cosine scan over
//! the scoped vectors, which is the acceptable exact fallback for corpora of
//! this size.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::PipelineError;
use crate::models::{
    Document, Fragment, FragmentDraft, RetrievalHit, SummaryContent, STATUS_COMPLETED,
    STATUS_UPLOADED,
};

// ============ Documents ============

/// Register a new document row with status `uploaded`.
pub async fn insert_document(
    pool: &SqlitePool,
    subject: Option<&str>,
    filename: &str,
    category: &str,
    storage_path: &str,
) -> Result<String, PipelineError> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, subject, filename, category, storage_path, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(subject)
    .bind(filename)
    .bind(category)
    .bind(storage_path)
    .bind(STATUS_UPLOADED)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Load a document by id, failing with [`PipelineError::DocumentNotFound`]
/// when no row exists.
pub async fn load_document(pool: &SqlitePool, id: &str) -> Result<Document, PipelineError> {
    let row = sqlx::query(
        "SELECT id, subject, filename, category, storage_path, status, error, created_at, completed_at
         FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let row = row.ok_or_else(|| PipelineError::DocumentNotFound(id.to_string()))?;

    Ok(Document {
        id: row.get("id"),
        subject: row.get("subject"),
        filename: row.get("filename"),
        category: row.get("category"),
        storage_path: row.get("storage_path"),
        status: row.get("status"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

/// Transition a document's status. Only the summarization orchestrator
/// calls this; a terminal `completed` transition also records the
/// completion timestamp, a `failed` one records the error message.
pub async fn set_document_status(
    pool: &SqlitePool,
    id: &str,
    status: &str,
    error: Option<&str>,
) -> Result<(), PipelineError> {
    let completed_at = if status == STATUS_COMPLETED {
        Some(chrono::Utc::now().timestamp())
    } else {
        None
    };

    sqlx::query("UPDATE documents SET status = ?, error = ?, completed_at = ? WHERE id = ?")
        .bind(status)
        .bind(error)
        .bind(completed_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

// ============ Fragments ============

/// Atomically replace a document's full fragment set.
///
/// Deletes any prior fragments and vectors for the document, then inserts
/// the new batch, all inside one transaction. Re-ingestion therefore
/// supersedes the prior set — index ranges never partially overlap, and a
/// failure leaves the previous set intact.
pub async fn replace_fragments(
    pool: &SqlitePool,
    document_id: &str,
    fragments: &[(FragmentDraft, Vec<f32>)],
) -> Result<usize, PipelineError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM fragment_vectors WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM fragments WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for (draft, vector) in fragments {
        let fragment_id = Uuid::new_v4().to_string();
        let hash = hash_text(&draft.content);
        let metadata = serde_json::json!({
            "start_offset": draft.start_offset,
            "end_offset": draft.end_offset,
            "length": draft.length,
        });

        sqlx::query(
            r#"
            INSERT INTO fragments (id, document_id, frag_index, content, hash, metadata_json)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fragment_id)
        .bind(document_id)
        .bind(draft.index)
        .bind(&draft.content)
        .bind(&hash)
        .bind(metadata.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO fragment_vectors (fragment_id, document_id, embedding) VALUES (?, ?, ?)",
        )
        .bind(&fragment_id)
        .bind(document_id)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(fragments.len())
}

/// A document's fragments in index order.
pub async fn list_fragments(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<Vec<Fragment>, PipelineError> {
    let rows = sqlx::query(
        "SELECT id, document_id, frag_index, content, hash, metadata_json
         FROM fragments WHERE document_id = ? ORDER BY frag_index ASC",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Fragment {
            id: row.get("id"),
            document_id: row.get("document_id"),
            frag_index: row.get("frag_index"),
            content: row.get("content"),
            hash: row.get("hash"),
            metadata_json: row.get("metadata_json"),
        })
        .collect())
}

// ============ Similarity query ============

/// Top-K similarity query over stored fragment vectors.
///
/// Similarity is cosine similarity (`1 - cosine_distance`), so higher is
/// more similar. Only fragments scoring strictly greater than `floor` are
/// returned, ordered descending, truncated to `limit`. When `scope` is
/// given, only that document's fragments are searched. Zero rows is a
/// valid "no relevant context" outcome, not an error.
pub async fn query_similar(
    pool: &SqlitePool,
    query_vec: &[f32],
    scope: Option<&str>,
    floor: f64,
    limit: i64,
) -> Result<Vec<RetrievalHit>, PipelineError> {
    let rows = match scope {
        Some(document_id) => {
            sqlx::query(
                r#"
                SELECT fv.fragment_id, fv.document_id, fv.embedding, f.frag_index, f.content
                FROM fragment_vectors fv
                JOIN fragments f ON f.id = fv.fragment_id
                WHERE fv.document_id = ?
                "#,
            )
            .bind(document_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT fv.fragment_id, fv.document_id, fv.embedding, f.frag_index, f.content
                FROM fragment_vectors fv
                JOIN fragments f ON f.id = fv.fragment_id
                "#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    let mut hits: Vec<RetrievalHit> = rows
        .iter()
        .filter_map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            let similarity = cosine_similarity(query_vec, &vector) as f64;
            if similarity > floor {
                Some(RetrievalHit {
                    fragment_id: row.get("fragment_id"),
                    document_id: row.get("document_id"),
                    frag_index: row.get("frag_index"),
                    content: row.get("content"),
                    similarity,
                })
            } else {
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit.max(0) as usize);

    Ok(hits)
}

// ============ Summaries ============

/// Insert or overwrite the one summary row for a document.
///
/// The `document_id` unique constraint makes regeneration a clean
/// overwrite; concurrent regenerations settle to a single row without
/// external locking.
pub async fn upsert_summary(
    pool: &SqlitePool,
    document_id: &str,
    summary: &SummaryContent,
) -> Result<(), PipelineError> {
    let now = chrono::Utc::now().timestamp();

    let key_findings = serde_json::to_string(&summary.key_findings)
        .map_err(|e| PipelineError::Generation(e.to_string()))?;
    let reasoning_steps = serde_json::to_string(&summary.reasoning_steps)
        .map_err(|e| PipelineError::Generation(e.to_string()))?;
    let recommendations = serde_json::to_string(&summary.recommendations)
        .map_err(|e| PipelineError::Generation(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO summaries (document_id, key_findings_json, reasoning_steps_json, recommendations_json, full_summary, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(document_id) DO UPDATE SET
            key_findings_json = excluded.key_findings_json,
            reasoning_steps_json = excluded.reasoning_steps_json,
            recommendations_json = excluded.recommendations_json,
            full_summary = excluded.full_summary,
            created_at = excluded.created_at
        "#,
    )
    .bind(document_id)
    .bind(&key_findings)
    .bind(&reasoning_steps)
    .bind(&recommendations)
    .bind(&summary.full_summary)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a document's summary, if one has been generated.
pub async fn get_summary(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<Option<SummaryContent>, PipelineError> {
    let row = sqlx::query(
        "SELECT key_findings_json, reasoning_steps_json, recommendations_json, full_summary
         FROM summaries WHERE document_id = ?",
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let key_findings_json: String = row.get("key_findings_json");
    let reasoning_steps_json: String = row.get("reasoning_steps_json");
    let recommendations_json: String = row.get("recommendations_json");

    Ok(Some(SummaryContent {
        key_findings: serde_json::from_str(&key_findings_json).unwrap_or_default(),
        reasoning_steps: serde_json::from_str(&reasoning_steps_json).unwrap_or_default(),
        recommendations: serde_json::from_str(&recommendations_json).unwrap_or_default(),
        full_summary: row.get("full_summary"),
    }))
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
