use crate::MedragError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Number of matches requested from the index store per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Rendered output when the index store returns no matches.
pub const NO_MATCH: &str = "<No_Match>";

/// Section body used when a match carries no `chunk` metadata.
pub const MISSING_CHUNK: &str = "No data available";

/// Summary placed in the `error` field of every [`QueryFailure`].
pub const ERROR_SUMMARY: &str = "Error processing request.";

/// Metadata key holding the human-readable retrieved text.
const CHUNK_KEY: &str = "chunk";

/// Arbitrary key-value metadata attached to an indexed vector.
pub type Metadata = HashMap<String, serde_json::Value>;

// --- Wire shapes ---

/// A single nearest-neighbor hit returned by an index store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Identifier of the stored vector.
    pub id: String,
    /// Similarity score; higher means more similar.
    #[serde(default)]
    pub score: f32,
    /// Raw vector values, only present when requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f32>,
    /// Metadata stored alongside the vector, only present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Match {
    /// Creates a match without values or metadata.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            values: Vec::new(),
            metadata: None,
        }
    }

    /// Attaches a `chunk` metadata entry.
    pub fn with_chunk(mut self, chunk: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(CHUNK_KEY.to_string(), serde_json::Value::String(chunk.into()));
        self
    }

    /// Text stored under the `chunk` metadata key.
    ///
    /// `null` is treated as absent; non-string values render as JSON text.
    pub fn chunk(&self) -> Option<Cow<'_, str>> {
        match self.metadata.as_ref()?.get(CHUNK_KEY)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Cow::Borrowed(s)),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

/// A similarity query against one namespace of an index.
///
/// Serializes to the camelCase body accepted by Pinecone's `/query` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Namespace (partition) to search; empty means the default namespace.
    pub namespace: String,
    /// Maximum number of matches to return.
    pub top_k: usize,
    /// The query embedding.
    pub vector: Vec<f32>,
    /// Whether matches should carry their raw vector values.
    pub include_values: bool,
    /// Whether matches should carry their metadata.
    pub include_metadata: bool,
}

impl QueryRequest {
    /// Top-5 query with metadata and without raw values.
    pub fn new(namespace: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            namespace: namespace.into(),
            top_k: DEFAULT_TOP_K,
            vector,
            include_values: false,
            include_metadata: true,
        }
    }
}

/// Ranked matches returned for a [`QueryRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Matches ordered by descending score.
    #[serde(default)]
    pub matches: Vec<Match>,
    /// Namespace that was searched.
    #[serde(default)]
    pub namespace: String,
}

// --- Outcome types ---

/// Successful outcome of a retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "matches", rename_all = "snake_case")]
pub enum Retrieval {
    /// At least one match, in index-store order.
    Findings(Vec<Match>),
    /// The index store returned nothing.
    NoMatch,
}

impl Retrieval {
    /// Keeps at most `limit` matches; an empty list becomes [`Retrieval::NoMatch`].
    pub fn from_matches(mut matches: Vec<Match>, limit: usize) -> Self {
        matches.truncate(limit);
        if matches.is_empty() {
            Self::NoMatch
        } else {
            Self::Findings(matches)
        }
    }

    /// Number of findings (zero for [`Retrieval::NoMatch`]).
    pub fn len(&self) -> usize {
        match self {
            Self::Findings(matches) => matches.len(),
            Self::NoMatch => 0,
        }
    }

    /// True when there are no findings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the findings as labeled sections separated by blank lines.
    ///
    /// ```
    /// use medrag_core::{Match, Retrieval};
    ///
    /// let r = Retrieval::from_matches(vec![Match::new("a", 0.9).with_chunk("EKG normal")], 5);
    /// assert_eq!(r.render(), "\n Clinical Finding 1: \n EKG normal");
    /// ```
    pub fn render(&self) -> String {
        let matches = match self {
            Self::Findings(matches) if !matches.is_empty() => matches,
            _ => return NO_MATCH.to_string(),
        };

        let sections: Vec<String> = matches
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let chunk = m.chunk().unwrap_or(Cow::Borrowed(MISSING_CHUNK));
                format!(" Clinical Finding {}: \n {chunk}", i + 1)
            })
            .collect();

        format!("\n{}", sections.join("\n\n"))
    }
}

impl fmt::Display for Retrieval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Step of the retrieval pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Caller input was rejected before any network call.
    Input,
    /// The embedding provider failed.
    Embedding,
    /// The index query failed.
    Index,
}

impl FailureStage {
    /// Lowercase name used in logs and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Embedding => "embedding",
            Self::Index => "index",
        }
    }
}

/// Failure payload reported to callers instead of a panic or raw error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    /// Always [`ERROR_SUMMARY`].
    pub error: String,
    /// Description of the underlying error.
    pub message: String,
    /// Where the pipeline stopped.
    pub stage: FailureStage,
}

impl QueryFailure {
    /// Wraps an error raised at `stage`.
    pub fn new(stage: FailureStage, err: &MedragError) -> Self {
        Self {
            error: ERROR_SUMMARY.to_string(),
            message: err.to_string(),
            stage,
        }
    }

    /// The `{error, message, stage}` object as a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "error": self.error,
            "message": self.message,
            "stage": self.stage.as_str(),
        })
        .to_string()
    }
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} stage): {}", self.error, self.stage.as_str(), self.message)
    }
}

impl std::error::Error for QueryFailure {}
