use medrag_core::{MedragError, MedragResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hugging Face API token.
pub const HF_TOKEN_ENV: &str = "HUGGINGFACE_API_TOKEN";
/// Embedding model identifier.
pub const MODEL_NAME_ENV: &str = "MODEL_NAME";
/// Pinecone API key.
pub const PINECONE_API_KEY_ENV: &str = "PINECONE_API_KEY";
/// Pinecone data-plane host, skips index description when set.
pub const PINECONE_INDEX_HOST_ENV: &str = "PINECONE_INDEX_HOST";

/// Which embedding provider to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Hugging Face hosted feature extraction.
    #[default]
    HuggingFace,
    /// Offline hashed bag-of-words embedding.
    Local,
}

/// Which vector index store to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Pinecone managed index.
    #[default]
    Pinecone,
    /// In-memory store loaded from a JSONL file.
    Local,
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Vector size of the local provider.
    #[serde(default = "default_local_dimension")]
    pub dimension: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub provider: IndexBackend,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub controller_url: Option<String>,
    /// Data-plane host of `pinned_index`; that index is never described.
    #[serde(default)]
    pub index_host: Option<String>,
    /// The one index served by `index_host`. Defaults to `[query].index_name`.
    #[serde(default)]
    pub pinned_index: Option<String>,
    /// JSONL file backing the local store.
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[query]` section: defaults for callers that do not name a target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDefaults {
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub namespace: String,
}

/// Complete configuration, built once at startup and injected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub query: QueryDefaults,
}

fn default_local_dimension() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model_id: None,
            api_key: None,
            api_base_url: None,
            dimension: default_local_dimension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: IndexBackend::default(),
            api_key: None,
            controller_url: None,
            index_host: None,
            pinned_index: None,
            data_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> &str {
        match non_blank(&self.api_base_url) {
            Some(url) => url,
            None => crate::huggingface::DEFAULT_BASE_URL,
        }
    }

    /// Configured model id, if any.
    pub fn model(&self) -> Option<&str> {
        non_blank(&self.model_id)
    }
}

impl IndexConfig {
    pub fn controller_url(&self) -> &str {
        match non_blank(&self.controller_url) {
            Some(url) => url,
            None => crate::pinecone::DEFAULT_CONTROLLER_URL,
        }
    }
}

impl RetrievalConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> MedragResult<Self> {
        toml::from_str(source).map_err(|e| MedragError::Config(format!("Invalid config: {e}")))
    }

    /// Reads a TOML file; a missing file yields the defaults.
    pub async fn load(path: &Path) -> MedragResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => Self::from_toml_str(&source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(MedragError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Fills settings left blank in the file from `lookup`.
    ///
    /// Values present in the file always win.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if non_blank(&self.embedding.api_key).is_none() {
            self.embedding.api_key = lookup(HF_TOKEN_ENV);
        }
        if non_blank(&self.embedding.model_id).is_none() {
            self.embedding.model_id = lookup(MODEL_NAME_ENV);
        }
        if non_blank(&self.index.api_key).is_none() {
            self.index.api_key = lookup(PINECONE_API_KEY_ENV);
        }
        if non_blank(&self.index.index_host).is_none() {
            self.index.index_host = lookup(PINECONE_INDEX_HOST_ENV);
        }
        if non_blank(&self.index.index_host).is_some()
            && non_blank(&self.index.pinned_index).is_none()
        {
            self.index.pinned_index = non_blank(&self.query.index_name).map(str::to_string);
        }
        self
    }

    /// [`RetrievalConfig::with_env`] against the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Rejects configurations that cannot serve a single query.
    pub fn validate(&self) -> MedragResult<()> {
        match self.embedding.provider {
            EmbeddingBackend::HuggingFace => {
                if non_blank(&self.embedding.api_key).is_none() {
                    return Err(MedragError::Config(format!(
                        "Hugging Face API token is missing; set {HF_TOKEN_ENV} or [embedding].api_key"
                    )));
                }
                if self.embedding.model().is_none() {
                    return Err(MedragError::Config(format!(
                        "Embedding model is not set; set {MODEL_NAME_ENV} or [embedding].model_id"
                    )));
                }
            }
            EmbeddingBackend::Local => {
                if self.embedding.dimension == 0 {
                    return Err(MedragError::Config(
                        "Local embedding dimension must be greater than zero".to_string(),
                    ));
                }
            }
        }

        match self.index.provider {
            IndexBackend::Pinecone => {
                if non_blank(&self.index.api_key).is_none() {
                    return Err(MedragError::Config(format!(
                        "Pinecone API key is missing; set {PINECONE_API_KEY_ENV} or [index].api_key"
                    )));
                }
                if non_blank(&self.index.index_host).is_some()
                    && non_blank(&self.index.pinned_index).is_none()
                {
                    return Err(MedragError::Config(format!(
                        "{PINECONE_INDEX_HOST_ENV} serves one index; set [index].pinned_index or [query].index_name"
                    )));
                }
            }
            IndexBackend::Local => {
                if self.index.data_path.is_none() {
                    return Err(MedragError::Config(
                        "Local index requires [index].data_path".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
