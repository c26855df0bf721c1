//! # medsum
//!
//! A retrieval-augmented clinical report summarization pipeline.
//!
//! medsum ingests uploaded reports by splitting them into overlapping
//! fragments, embedding each fragment, and persisting fragments plus
//! vectors in SQLite. At summarization time it retrieves the most similar
//! fragments for the document, assembles a layered prompt (document content,
//! retrieved context, optional domain-model insights), calls a generative
//! model, and normalizes the response into one structured summary per
//! document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────┐   ┌──────────────┐
//! │  upload   │──▶│ Chunk + Embed   │──▶│    SQLite     │
//! │ (report)  │   │   (ingest)      │   │ fragments+vec │
//! └──────────┘   └─────────────────┘   └──────┬───────┘
//!                                             │ querySimilar
//!                 ┌─────────────────┐         ▼
//!                 │  Summarization  │◀── retrieved context
//!                 │  Orchestrator   │◀── domain insights (best-effort)
//!                 └────────┬────────┘
//!                          ▼
//!                   generative model → structured summary (upsert)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store and persistence |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Best-effort context retrieval |
//! | [`insight`] | Domain-insight side channel |
//! | [`generate`] | Generative client and response parsing |
//! | [`summarize`] | Summarization orchestrator |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod get;
pub mod ingest;
pub mod insight;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod summarize;
