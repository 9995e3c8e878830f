pub mod assembly;
pub mod dedup;
pub mod isolation;
pub mod language;
pub mod pipeline;
pub mod recency;
pub mod scoring;
pub mod snippets;
pub mod threshold;

use chrono::{DateTime, Utc};
use tracing::instrument;

pub use assembly::{assemble_knowledge, AssemblyOptions};
pub use pipeline::{
    PipelineStageTimings, RepoIdentity, RetrievalCollaborators, RetrievalConfig,
    RetrievalOverrides, RetrieveResult, StageKind, VariantFailure,
};

/// Primary entry point: retrieves prior findings relevant to a pull request.
///
/// Returns `None` when retrieval is disabled or there is nothing to search
/// for. Every other outcome, including collaborator failures, is `Some`; a
/// failed run simply carries no findings.
pub async fn retrieve_knowledge(
    identity: &RepoIdentity,
    queries: &[String],
    config: &RetrievalConfig,
    collaborators: RetrievalCollaborators<'_>,
) -> Option<RetrieveResult> {
    retrieve_knowledge_at(identity, queries, config, collaborators, Utc::now()).await
}

/// As [`retrieve_knowledge`], with an explicit reference time for recency.
#[instrument(skip_all, fields(owner = %identity.owner, repo = %identity.repo))]
pub async fn retrieve_knowledge_at(
    identity: &RepoIdentity,
    queries: &[String],
    config: &RetrievalConfig,
    collaborators: RetrievalCollaborators<'_>,
    now: DateTime<Utc>,
) -> Option<RetrieveResult> {
    pipeline::run_pipeline(identity, queries, config, collaborators, now).await
}
