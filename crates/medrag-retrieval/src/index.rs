use crate::config::{IndexBackend, IndexConfig};
use crate::pinecone::PineconeClient;
use async_trait::async_trait;
use medrag_core::{Match, MedragError, MedragResult, Metadata, QueryRequest, QueryResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Trait for vector index backends.
///
/// An index is addressed by name; a query is scoped to one namespace inside it.
#[async_trait]
pub trait VectorIndexStore: Send + Sync {
    /// Nearest neighbors of `request.vector`, best first, at most `request.top_k`.
    async fn query(&self, index_name: &str, request: &QueryRequest) -> MedragResult<QueryResponse>;
}

/// Builds the store selected by `config`.
pub async fn index_store_from_config(config: &IndexConfig) -> MedragResult<Arc<dyn VectorIndexStore>> {
    let store: Arc<dyn VectorIndexStore> = match config.provider {
        IndexBackend::Pinecone => Arc::new(PineconeClient::new(config)?),
        IndexBackend::Local => {
            let path = config.data_path.as_deref().ok_or_else(|| {
                MedragError::Config("Local index requires [index].data_path".to_string())
            })?;
            Arc::new(InMemoryIndexStore::load_jsonl(path).await?)
        }
    };
    Ok(store)
}

/// One stored vector, as read from a JSONL data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub index: String,
    #[serde(default)]
    pub namespace: String,
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone)]
struct StoredVector {
    id: String,
    values: Vec<f32>,
    metadata: Option<Metadata>,
}

#[derive(Debug)]
struct LocalIndex {
    dimension: usize,
    namespaces: HashMap<String, Vec<StoredVector>>,
}

/// In-memory index store using brute-force cosine similarity.
///
/// Indexes have a fixed dimension set at creation; vectors of any other length
/// are rejected on upsert and on query.
pub struct InMemoryIndexStore {
    indexes: RwLock<HashMap<String, LocalIndex>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty index. Re-creating with the same dimension is a no-op.
    pub async fn create_index(&self, name: &str, dimension: usize) -> MedragResult<()> {
        if name.trim().is_empty() {
            return Err(MedragError::Index("Index name must not be empty".to_string()));
        }
        if dimension == 0 {
            return Err(MedragError::Index(format!(
                "Index '{name}' must have a non-zero dimension"
            )));
        }

        let mut indexes = self.indexes.write().await;
        match indexes.get(name) {
            Some(existing) if existing.dimension != dimension => Err(MedragError::Index(format!(
                "Index '{name}' already exists with dimension {}",
                existing.dimension
            ))),
            Some(_) => Ok(()),
            None => {
                indexes.insert(
                    name.to_string(),
                    LocalIndex {
                        dimension,
                        namespaces: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Inserts or replaces a vector. A missing index is created with the
    /// record's dimension.
    pub async fn upsert(&self, record: IndexRecord) -> MedragResult<()> {
        if record.values.is_empty() {
            return Err(MedragError::Index(format!(
                "Record '{}' has no vector values",
                record.id
            )));
        }
        self.create_index(&record.index, record.values.len()).await?;

        let mut indexes = self.indexes.write().await;
        let index = indexes
            .get_mut(&record.index)
            .ok_or_else(|| MedragError::Index(format!("Index '{}' not found", record.index)))?;
        if record.values.len() != index.dimension {
            return Err(MedragError::Index(format!(
                "Record '{}' has dimension {}, index '{}' expects {}",
                record.id,
                record.values.len(),
                record.index,
                index.dimension
            )));
        }

        let vectors = index.namespaces.entry(record.namespace).or_default();
        let stored = StoredVector {
            id: record.id,
            values: record.values,
            metadata: record.metadata,
        };
        match vectors.iter_mut().find(|v| v.id == stored.id) {
            Some(slot) => *slot = stored,
            None => vectors.push(stored),
        }
        Ok(())
    }

    /// Number of vectors in one namespace of an index.
    pub async fn count(&self, index_name: &str, namespace: &str) -> usize {
        let indexes = self.indexes.read().await;
        indexes
            .get(index_name)
            .and_then(|index| index.namespaces.get(namespace))
            .map_or(0, Vec::len)
    }

    /// Loads every [`IndexRecord`] line of a JSONL file. Blank lines are skipped.
    pub async fn load_jsonl(path: &Path) -> MedragResult<Self> {
        let data = tokio::fs::read_to_string(path).await.map_err(|e| {
            MedragError::Index(format!(
                "Failed to read index data '{}': {e}",
                path.display()
            ))
        })?;

        let store = Self::new();
        let mut loaded = 0usize;
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: IndexRecord = serde_json::from_str(line).map_err(|e| {
                MedragError::Index(format!("Invalid record on line {}: {e}", lineno + 1))
            })?;
            store.upsert(record).await?;
            loaded += 1;
        }

        info!(path = %path.display(), records = loaded, "Local index data loaded");
        Ok(store)
    }
}

impl Default for InMemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndexStore for InMemoryIndexStore {
    async fn query(&self, index_name: &str, request: &QueryRequest) -> MedragResult<QueryResponse> {
        let indexes = self.indexes.read().await;
        let index = indexes
            .get(index_name)
            .ok_or_else(|| MedragError::Index(format!("Index '{index_name}' not found")))?;

        if request.vector.len() != index.dimension {
            return Err(MedragError::Index(format!(
                "Query vector dimension {} does not match index '{index_name}' dimension {}",
                request.vector.len(),
                index.dimension
            )));
        }

        let mut matches: Vec<Match> = index
            .namespaces
            .get(&request.namespace)
            .map(|vectors| {
                vectors
                    .iter()
                    .map(|v| Match {
                        id: v.id.clone(),
                        score: cosine_similarity(&request.vector, &v.values),
                        values: if request.include_values {
                            v.values.clone()
                        } else {
                            Vec::new()
                        },
                        metadata: if request.include_metadata {
                            v.metadata.clone()
                        } else {
                            None
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(request.top_k);

        Ok(QueryResponse {
            matches,
            namespace: request.namespace.clone(),
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
