//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, fragments, and summaries that flow
//! through the ingestion and summarization pipelines.

use serde::{Deserialize, Serialize};

/// Document processing status values, driven exclusively by the
/// summarization orchestrator. Ingestion never touches status.
pub const STATUS_UPLOADED: &str = "uploaded";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// A registered source document. Immutable once ingested; only `status`,
/// `error`, and `completed_at` change afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub subject: Option<String>,
    pub filename: String,
    pub category: String,
    pub storage_path: String,
    pub status: String,
    pub error: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

/// Output of the chunker before ids and vectors are attached.
///
/// Offsets are `char` offsets into the untrimmed source text; `length` is
/// the trimmed content's char count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDraft {
    pub index: i64,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub length: usize,
}

/// A persisted fragment of a document's text.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: String,
    pub document_id: String,
    pub frag_index: i64,
    pub content: String,
    pub hash: String,
    pub metadata_json: String,
}

/// One row of a similarity query. Transient — rebuilt fresh per retrieval
/// call, never cached or persisted.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub fragment_id: String,
    pub document_id: String,
    pub frag_index: i64,
    pub content: String,
    pub similarity: f64,
}

/// Canonical structured summary shape. Both generation response shapes
/// (structured function-call and free text) normalize into this.
///
/// Invariant: `key_findings`, `reasoning_steps`, and `recommendations` are
/// never empty — missing sections get single-item placeholders.
/// `full_summary` preserves the model's narrative verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryContent {
    pub key_findings: Vec<String>,
    /// Ordered (label, text) pairs, e.g. ("Step 1", "...").
    pub reasoning_steps: Vec<(String, String)>,
    pub recommendations: Vec<String>,
    pub full_summary: String,
}

/// Tagged union over the two supported generative response shapes.
///
/// A single normalization function ([`crate::generate::normalize`]) converts
/// either variant into [`SummaryContent`], so the orchestrator never
/// branches on response shape.
#[derive(Debug, Clone)]
pub enum GenerationResult {
    /// A function-call-style JSON payload with the four named fields.
    Structured(serde_json::Value),
    /// Unstructured prose, parsed heuristically.
    FreeText(String),
}
