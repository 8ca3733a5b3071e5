use crate::config::{non_blank, EmbeddingConfig};
use crate::embedding::{EmbeddingProvider, FeatureExtractionOutput};
use async_trait::async_trait;
use medrag_core::{MedragError, MedragResult};
use std::time::Duration;
use tracing::debug;

/// Hosted inference endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Hugging Face feature-extraction backend.
///
/// Posts `{"inputs": ...}` to `{base}/models/{model}` and accepts any of the
/// shapes in [`FeatureExtractionOutput`].
pub struct HuggingFaceEmbedding {
    model_id: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl HuggingFaceEmbedding {
    pub fn new(config: &EmbeddingConfig) -> MedragResult<Self> {
        let api_key = non_blank(&config.api_key)
            .ok_or_else(|| MedragError::Config("Hugging Face API token is missing".to_string()))?;
        let model_id = config
            .model()
            .ok_or_else(|| MedragError::Config("Embedding model is not set".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MedragError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            model_id: model_id.to_string(),
            api_key: api_key.to_string(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model_id)
    }

    async fn feature_extraction(
        &self,
        inputs: serde_json::Value,
    ) -> MedragResult<FeatureExtractionOutput> {
        let url = self.endpoint();
        debug!(model = %self.model_id, url = %url, "Requesting feature extraction");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "inputs": inputs }))
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
                "Hugging Face API error {status}: {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            MedragError::Embedding(format!("Unexpected feature-extraction response: {e}"))
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbedding {
    async fn embed(&self, text: &str) -> MedragResult<Vec<f32>> {
        self.feature_extraction(serde_json::Value::String(text.to_string()))
            .await?
            .into_single()
    }

    async fn embed_batch(&self, texts: &[&str]) -> MedragResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.feature_extraction(serde_json::json!(texts))
            .await?
            .into_batch(texts.len())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(base: Option<&str>) -> EmbeddingConfig {
        EmbeddingConfig {
            model_id: Some("sentence-transformers/all-MiniLM-L6-v2".to_string()),
            api_key: Some("hf_test".to_string()),
            api_base_url: base.map(str::to_string),
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_endpoint_uses_default_base() {
        let emb = HuggingFaceEmbedding::new(&config(None)).unwrap();
        assert_eq!(
            emb.endpoint(),
            "https://api-inference.huggingface.co/models/sentence-transformers/all-MiniLM-L6-v2"
        );
        assert_eq!(emb.model_id(), "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(emb.dimension(), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let emb = HuggingFaceEmbedding::new(&config(Some("http://localhost:8080/"))).unwrap();
        assert_eq!(
            emb.endpoint(),
            "http://localhost:8080/models/sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn test_new_requires_token_and_model() {
        let mut c = config(None);
        c.api_key = None;
        assert!(matches!(
            HuggingFaceEmbedding::new(&c),
            Err(MedragError::Config(_))
        ));

        let mut c = config(None);
        c.model_id = Some(" ".to_string());
        assert!(matches!(
            HuggingFaceEmbedding::new(&c),
            Err(MedragError::Config(_))
        ));
    }
}
