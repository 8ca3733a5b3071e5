//! Retrieval pipeline: embed a query, search a vector index, render findings.
//!
//! Both collaborators sit behind traits so remote services and local
//! stand-ins are interchangeable.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`] — Trait for turning text into a vector.
//! - [`HuggingFaceEmbedding`] — Hugging Face feature-extraction provider.
//! - [`LocalEmbedding`] — Offline hashed bag-of-words provider.
//! - [`VectorIndexStore`] — Trait for nearest-neighbor queries by index and namespace.
//! - [`PineconeClient`] — Pinecone control- and data-plane client.
//! - [`InMemoryIndexStore`] — Local store, optionally loaded from JSONL.
//! - [`QueryVectorStore`] — The query pipeline itself.
//! - [`RetrievalConfig`] — TOML + environment configuration.

/// Configuration loading and validation.
pub mod config;
/// Embedding provider trait, response shapes, and local implementation.
pub mod embedding;
/// Hugging Face inference client.
pub mod huggingface;
/// Vector index store trait and in-memory implementation.
pub mod index;
/// Pinecone client.
pub mod pinecone;
/// The query pipeline.
pub mod query;

pub use config::{
    EmbeddingBackend, EmbeddingConfig, IndexBackend, IndexConfig, QueryDefaults, RetrievalConfig,
};
pub use embedding::{embedder_from_config, EmbeddingProvider, FeatureExtractionOutput, LocalEmbedding};
pub use huggingface::HuggingFaceEmbedding;
pub use index::{index_store_from_config, InMemoryIndexStore, IndexRecord, VectorIndexStore};
pub use pinecone::{IndexDescription, PineconeClient, PineconeIndex};
pub use query::QueryVectorStore;
