//! Core types and error definitions for medrag.
//!
//! This crate provides the foundational types shared across the medrag crates:
//! the unified error enum, the wire-level shapes exchanged with a vector index,
//! and the retrieval outcome together with its text rendering.
//!
//! # Main types
//!
//! - [`MedragError`] — Unified error enum for all medrag subsystems.
//! - [`MedragResult`] — Convenience alias for `Result<T, MedragError>`.
//! - [`Match`] — A single nearest-neighbor hit returned by an index store.
//! - [`QueryRequest`] / [`QueryResponse`] — Similarity query and its answer.
//! - [`Retrieval`] — Ranked findings or the no-match marker.
//! - [`QueryFailure`] — Serializable failure payload (`{error, message}`).

/// Retrieval data model and rendering.
pub mod model;

pub use model::{
    FailureStage, Match, Metadata, QueryFailure, QueryRequest, QueryResponse, Retrieval,
    DEFAULT_TOP_K, ERROR_SUMMARY, MISSING_CHUNK, NO_MATCH,
};

// --- Error types ---

/// Top-level error type for medrag.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum MedragError {
    /// Missing or invalid configuration (credentials, model name, paths).
    #[error("Config error: {0}")]
    Config(String),

    /// Caller-supplied input rejected before any network call.
    #[error("Input error: {0}")]
    Input(String),

    /// The embedding provider failed or returned an unusable shape.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The vector index store rejected or failed the query.
    #[error("Index error: {0}")]
    Index(String),

    /// An outbound HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`MedragError`].
pub type MedragResult<T> = Result<T, MedragError>;
