use crate::embedding::EmbeddingProvider;
use crate::index::VectorIndexStore;
use medrag_core::{
    FailureStage, MedragError, QueryFailure, QueryRequest, Retrieval, DEFAULT_TOP_K,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Embeds a search query and retrieves the closest stored chunks.
///
/// The embedding provider is fixed at construction; the index store is passed
/// per call so one pipeline can serve several stores.
pub struct QueryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QueryVectorStore {
    /// Pipeline that embeds every query with `embedder`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    /// Runs one query: embed, search `namespace` of `index_name`, keep the top
    /// [`DEFAULT_TOP_K`] matches in store order.
    ///
    /// Every failure is logged and returned as a [`QueryFailure`]; nothing is
    /// propagated past this call. The store is not contacted when embedding
    /// fails or yields an empty or all-zero vector, which has no direction to
    /// rank by.
    pub async fn query(
        &self,
        store: &dyn VectorIndexStore,
        index_name: &str,
        namespace: &str,
        search_query: &str,
    ) -> Result<Retrieval, QueryFailure> {
        if index_name.trim().is_empty() {
            return Err(self.fail(
                FailureStage::Input,
                index_name,
                namespace,
                MedragError::Input("Index name must not be empty".to_string()),
            ));
        }
        if search_query.trim().is_empty() {
            return Err(self.fail(
                FailureStage::Input,
                index_name,
                namespace,
                MedragError::Input("Search query must not be empty".to_string()),
            ));
        }

        let embedding = self
            .embedder
            .embed(search_query)
            .await
            .map_err(|e| self.fail(FailureStage::Embedding, index_name, namespace, e))?;
        if embedding.iter().all(|v| *v == 0.0) {
            return Err(self.fail(
                FailureStage::Embedding,
                index_name,
                namespace,
                MedragError::Embedding(format!(
                    "Query embedding is empty or all zeros ({} dimensions)",
                    embedding.len()
                )),
            ));
        }
        debug!(
            model = %self.embedder.model_id(),
            dimension = embedding.len(),
            "Query embedded"
        );

        let request = QueryRequest::new(namespace, embedding);
        let response = store
            .query(index_name, &request)
            .await
            .map_err(|e| self.fail(FailureStage::Index, index_name, namespace, e))?;

        let retrieval = Retrieval::from_matches(response.matches, DEFAULT_TOP_K);
        info!(
            index = %index_name,
            namespace = %namespace,
            matches = retrieval.len(),
            "Vector store query complete"
        );
        Ok(retrieval)
    }

    /// [`QueryVectorStore::query`] flattened to one string: the rendered
    /// findings, `<No_Match>`, or the JSON failure payload.
    pub async fn query_text(
        &self,
        store: &dyn VectorIndexStore,
        index_name: &str,
        namespace: &str,
        search_query: &str,
    ) -> String {
        match self.query(store, index_name, namespace, search_query).await {
            Ok(retrieval) => retrieval.render(),
            Err(failure) => failure.to_json(),
        }
    }

    fn fail(
        &self,
        stage: FailureStage,
        index_name: &str,
        namespace: &str,
        err: MedragError,
    ) -> QueryFailure {
        error!(
            stage = stage.as_str(),
            index = %index_name,
            namespace = %namespace,
            error = %err,
            "Vector store query failed"
        );
        QueryFailure::new(stage, &err)
    }
}
