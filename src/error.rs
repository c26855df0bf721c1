//! Error taxonomy for the summarization pipeline.
//!
//! Best-effort stages (retrieval, insight augmentation, content fetch during
//! summarization) swallow these locally and degrade; only load/generate/persist
//! failures propagate to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external model call returned a non-success response.
    #[error("provider call failed with status {status}: {body}")]
    Provider { status: u16, body: String },

    /// The data store rejected a read or write.
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    /// The document's raw content could not be retrieved from storage.
    #[error("content fetch failed for {path}: {reason}")]
    ContentFetch { path: String, reason: String },

    /// No document row exists for the given id.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The generative model call failed at the transport level. Parse
    /// failures never reach this — the free-text parser always yields a
    /// best-effort structured result.
    #[error("generation failed: {0}")]
    Generation(String),
}

impl PipelineError {
    pub fn provider(status: u16, body: impl Into<String>) -> Self {
        PipelineError::Provider {
            status,
            body: body.into(),
        }
    }
}
