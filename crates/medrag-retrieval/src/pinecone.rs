use crate::config::{non_blank, IndexConfig};
use crate::index::VectorIndexStore;
use async_trait::async_trait;
use medrag_core::{MedragError, MedragResult, QueryRequest, QueryResponse};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Control-plane endpoint used when none is configured.
pub const DEFAULT_CONTROLLER_URL: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2024-07";

/// Subset of the control plane's index description that queries need.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: String,
    /// Data-plane host, usually without a scheme.
    pub host: String,
}

/// Pinecone client.
///
/// Resolves an index's data-plane host through the control plane once and
/// reuses it for later queries. A host pinned in configuration serves exactly
/// one index name; other names are rejected.
pub struct PineconeClient {
    api_key: String,
    controller_url: String,
    pinned: Option<String>,
    resolved: RwLock<HashMap<String, ResolvedIndex>>,
    http: reqwest::Client,
}

#[derive(Debug, Clone)]
struct ResolvedIndex {
    host: String,
    dimension: Option<usize>,
}

impl PineconeClient {
    pub fn new(config: &IndexConfig) -> MedragResult<Self> {
        let api_key = non_blank(&config.api_key)
            .ok_or_else(|| MedragError::Config("Pinecone API key is missing".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MedragError::Http(format!("Failed to create HTTP client: {e}")))?;

        let mut resolved = HashMap::new();
        let pinned = match non_blank(&config.index_host) {
            Some(host) => {
                let name = non_blank(&config.pinned_index).ok_or_else(|| {
                    MedragError::Config(
                        "[index].index_host requires [index].pinned_index".to_string(),
                    )
                })?;
                resolved.insert(
                    name.to_string(),
                    ResolvedIndex {
                        host: host_url(host),
                        dimension: None,
                    },
                );
                Some(name.to_string())
            }
            None => None,
        };

        Ok(Self {
            api_key: api_key.to_string(),
            controller_url: config.controller_url().trim_end_matches('/').to_string(),
            pinned,
            resolved: RwLock::new(resolved),
            http,
        })
    }

    /// `GET /indexes/{name}` on the control plane.
    pub async fn describe_index(&self, name: &str) -> MedragResult<IndexDescription> {
        let url = format!("{}/indexes/{name}", self.controller_url);
        debug!(index = %name, url = %url, "Describing Pinecone index");

        let resp = with_headers(self.http.get(&url), &self.api_key)
            .send()
            .await
            .map_err(|e| MedragError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MedragError::Http(e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MedragError::Index(format!("Index '{name}' not found")));
        }
        if !status.is_success() {
            return Err(MedragError::Http(format!(
                "Pinecone API error {status}: {body}"
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Handle on one index, ready to query.
    pub async fn index(&self, name: &str) -> MedragResult<PineconeIndex> {
        if name.trim().is_empty() {
            return Err(MedragError::Index("Index name must not be empty".to_string()));
        }

        let cached = self.resolved.read().await.get(name).cloned();
        let resolved = match cached {
            Some(resolved) => resolved,
            None => {
                if let Some(pinned) = &self.pinned {
                    return Err(MedragError::Index(format!(
                        "Index '{name}' is not served by the configured host (pinned to '{pinned}')"
                    )));
                }
                let description = self.describe_index(name).await?;
                let resolved = ResolvedIndex {
                    host: host_url(&description.host),
                    dimension: Some(description.dimension),
                };
                self.resolved
                    .write()
                    .await
                    .insert(name.to_string(), resolved.clone());
                resolved
            }
        };

        Ok(PineconeIndex {
            name: name.to_string(),
            host: resolved.host,
            dimension: resolved.dimension,
            api_key: self.api_key.clone(),
            http: self.http.clone(),
        })
    }
}

#[async_trait]
impl VectorIndexStore for PineconeClient {
    async fn query(&self, index_name: &str, request: &QueryRequest) -> MedragResult<QueryResponse> {
        self.index(index_name).await?.query(request).await
    }
}

/// A resolved Pinecone index.
#[derive(Debug)]
pub struct PineconeIndex {
    name: String,
    host: String,
    dimension: Option<usize>,
    api_key: String,
    http: reqwest::Client,
}

impl PineconeIndex {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL of the data plane, scheme included.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Dimension reported by the control plane; `None` for pinned hosts.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// `POST /query` on the data plane.
    pub async fn query(&self, request: &QueryRequest) -> MedragResult<QueryResponse> {
        if let Some(dimension) = self.dimension {
            if request.vector.len() != dimension {
                return Err(MedragError::Index(format!(
                    "Query vector dimension {} does not match index '{}' dimension {dimension}",
                    request.vector.len(),
                    self.name
                )));
            }
        }

        let url = format!("{}/query", self.host);
        debug!(
            index = %self.name,
            namespace = %request.namespace,
            top_k = request.top_k,
            "Querying Pinecone index"
        );

        let resp = with_headers(self.http.post(&url), &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| MedragError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MedragError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(MedragError::Http(format!(
                "Pinecone query error {status}: {body}"
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn with_headers(request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
    request
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

/// Hosts from the control plane come without a scheme.
fn host_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
