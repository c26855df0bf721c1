//! Best-effort retrieval of contextual grounding for summarization.
//!
//! Embeds a query, asks the vector store for the most similar fragments of
//! one document, and renders them into a single context blob ordered by
//! descending similarity. Retrieval is always best-effort relative to the
//! overall summarization goal: any embedding or query failure collapses to
//! "no context available" (the empty string) and never aborts the caller.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::models::RetrievalHit;
use crate::store;

/// Retrieve and render relevant context for a document, or the empty
/// string when no fragment scores above the similarity floor (a valid
/// outcome) or when any step fails (a degraded one).
pub async fn retrieve_context(
    config: &Config,
    pool: &SqlitePool,
    document_id: &str,
    query: &str,
) -> String {
    retrieve_context_with(
        config,
        pool,
        document_id,
        query,
        config.retrieval.similarity_floor,
        config.retrieval.limit,
    )
    .await
}

/// [`retrieve_context`] with explicit floor and limit, for the debug CLI.
pub async fn retrieve_context_with(
    config: &Config,
    pool: &SqlitePool,
    document_id: &str,
    query: &str,
    floor: f64,
    limit: i64,
) -> String {
    let query_vec = match embedding::embed_query(&config.embedding, query).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(document_id, error = %e, "query embedding failed, proceeding without context");
            return String::new();
        }
    };

    let hits = match store::query_similar(pool, &query_vec, Some(document_id), floor, limit).await {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(document_id, error = %e, "similarity query failed, proceeding without context");
            return String::new();
        }
    };

    render_context(&hits)
}

/// Render hits as labeled blocks joined by blank lines, preserving the
/// descending-similarity order.
pub fn render_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[Context {} | similarity {:.1}%]\n{}",
                i + 1,
                hit.similarity * 100.0,
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// CLI entry point for debugging retrieval against one document.
pub async fn run_retrieve(
    config: &Config,
    document_id: &str,
    query: &str,
    floor: Option<f64>,
    limit: Option<i64>,
) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    // Fail loudly on a bad id here — the CLI is a debugging surface.
    store::load_document(&pool, document_id).await?;

    let floor = floor.unwrap_or(config.retrieval.similarity_floor);
    let limit = limit.unwrap_or(config.retrieval.limit);

    let blob = retrieve_context_with(config, &pool, document_id, query, floor, limit).await;
    pool.close().await;

    if blob.is_empty() {
        println!("No relevant context above floor {:.2}.", floor);
    } else {
        println!("{}", blob);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(index: i64, similarity: f64, content: &str) -> RetrievalHit {
        RetrievalHit {
            fragment_id: format!("f{}", index),
            document_id: "doc1".to_string(),
            frag_index: index,
            content: content.to_string(),
            similarity,
        }
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_context(&[]), "");
    }

    #[test]
    fn test_render_labeled_blocks() {
        let hits = vec![hit(0, 0.92, "alpha"), hit(3, 0.815, "beta")];
        let blob = render_context(&hits);
        assert_eq!(
            blob,
            "[Context 1 | similarity 92.0%]\nalpha\n\n[Context 2 | similarity 81.5%]\nbeta"
        );
    }

    #[tokio::test]
    async fn test_degrades_to_empty_on_embed_failure() {
        // Disabled provider fails to embed; retrieval must return "" rather
        // than an error.
        let config: crate::config::Config = toml::from_str(
            r#"
            [db]
            path = ":memory:"
            [chunking]
            size = 1000
            overlap = 200
            "#,
        )
        .unwrap();

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();

        let blob = retrieve_context(&config, &pool, "missing-doc", "anything").await;
        assert_eq!(blob, "");
    }
}
