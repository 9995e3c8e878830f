use async_trait::async_trait;
use common::{error::AppError, types::finding::RetrievalHit};
use serde::{Deserialize, Serialize};

/// One vector search against the repository partition, optionally widened to
/// the shared pool.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationRequest {
    pub query_embedding: Vec<f32>,
    pub owner: String,
    pub repo: String,
    pub sharing_enabled: bool,
    pub top_k: usize,
    pub distance_threshold: f64,
    pub adaptive: bool,
}

/// What the isolation layer reports about where its results came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationProvenance {
    #[serde(default)]
    pub shared_pool_used: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsolationResult {
    pub results: Vec<RetrievalHit>,
    pub provenance: IsolationProvenance,
}

/// Per-repository vector search. Storage lives outside this crate.
#[async_trait]
pub trait IsolationSearch: Send + Sync {
    async fn retrieve_with_isolation(
        &self,
        request: IsolationRequest,
    ) -> Result<IsolationResult, AppError>;
}
