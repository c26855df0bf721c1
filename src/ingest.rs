//! Ingestion pipeline orchestration.
//!
//! Runs the chunk → embed → persist flow for one document. Embedding
//! happens entirely before any write: a provider failure aborts the run
//! with zero fragments persisted, so a later attempt supersedes cleanly.
//! Ingestion never touches document status — status transitions belong to
//! the summarization orchestrator.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::error::PipelineError;
use crate::models::FragmentDraft;
use crate::store;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub fragments_written: usize,
    /// True when no embedding provider is configured and the run degraded
    /// to a no-op.
    pub retrieval_disabled: bool,
}

/// CLI entry point.
pub async fn run_ingest(config: &Config, document_id: &str) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    let result = ingest_document(config, &pool, document_id).await;
    pool.close().await;

    let stats = result?;

    println!("ingest {}", document_id);
    if stats.retrieval_disabled {
        println!("  fragments written: 0 (embedding provider disabled, retrieval unavailable)");
    } else {
        println!("  fragments written: {}", stats.fragments_written);
    }
    println!("ok");
    Ok(())
}

/// Ingest one document: fetch its raw content, chunk, embed every fragment,
/// and atomically replace the stored set.
pub async fn ingest_document(
    config: &Config,
    pool: &SqlitePool,
    document_id: &str,
) -> Result<IngestStats> {
    let document = store::load_document(pool, document_id).await?;

    // Fails early on a missing credential or incomplete provider config;
    // the disabled provider constructs fine and is handled below.
    let provider = embedding::create_provider(&config.embedding)?;

    // Supported degraded mode: no embedding credential means no retrieval
    // index, reported as zero fragments processed.
    if !config.embedding.is_enabled() {
        tracing::warn!(document_id, "embedding provider disabled, skipping ingestion");
        return Ok(IngestStats {
            fragments_written: 0,
            retrieval_disabled: true,
        });
    }

    let expected_dims = provider.dims();

    // Content fetch failure is fatal for ingestion — there is nothing to chunk.
    let content = std::fs::read_to_string(&document.storage_path).map_err(|e| {
        PipelineError::ContentFetch {
            path: document.storage_path.clone(),
            reason: e.to_string(),
        }
    })?;

    let drafts = chunk_text(&content, config.chunking.size, config.chunking.overlap);

    // Embed the full batch before writing anything, so a provider failure
    // leaves zero new fragments persisted.
    let mut embedded: Vec<(FragmentDraft, Vec<f32>)> = Vec::with_capacity(drafts.len());

    for batch in drafts.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
        let vectors = embedding::embed_texts(&config.embedding, &texts).await?;

        if vectors.len() != batch.len() {
            bail!(
                "embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            );
        }

        for (draft, vector) in batch.iter().zip(vectors.into_iter()) {
            // Mixed dimensionalities in one store are a configuration error.
            if vector.len() != expected_dims {
                bail!(
                    "embedding dimensionality mismatch: provider returned {} dims, config declares {}",
                    vector.len(),
                    expected_dims
                );
            }
            embedded.push((draft.clone(), vector));
        }
    }

    let written = store::replace_fragments(pool, document_id, &embedded).await?;

    tracing::debug!(
        document_id,
        fragments = written,
        model = provider.model_name(),
        "ingestion complete"
    );

    Ok(IngestStats {
        fragments_written: written,
        retrieval_disabled: false,
    })
}
