use std::{collections::HashMap, panic::AssertUnwindSafe};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    types::{
        anchor::SnippetAnchor,
        finding::{RerankedHit, RetrievalHit},
        provenance::{Provenance, ThresholdMethod},
    },
    utils::embedding::EmbeddingMode,
};
use futures::{stream, FutureExt, StreamExt};
use tracing::{debug, instrument, warn};

use crate::{
    isolation::{IsolationRequest, IsolationResult},
    language::rerank_by_language,
    snippets::{build_snippet_anchors, trim_snippet_anchors, AnchorFinding},
    threshold::ThresholdDecision,
};

use super::{
    config::{RepoIdentity, RetrievalConfig},
    diagnostics::{VariantFailure, VariantFailureKind},
    panic_message,
    variants::{build_variants, per_variant_top_k, RetrievalVariant, VariantType},
    BoxedStage, PipelineStage, PipelineStageTimings, RetrievalCollaborators, RetrieveResult,
    StageKind,
};

/// One variant's settled outcome, collected before merging.
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub index: usize,
    pub variant_type: VariantType,
    pub result: Result<IsolationResult, VariantFailure>,
}

pub struct PipelineContext<'a> {
    pub identity: &'a RepoIdentity,
    pub queries: &'a [String],
    pub config: &'a RetrievalConfig,
    pub collaborators: RetrievalCollaborators<'a>,
    pub now: DateTime<Utc>,
    pub outcomes: Vec<VariantOutcome>,
    pub candidate_count: usize,
    pub shared_pool_used: bool,
    pub merged: Vec<RetrievalHit>,
    pub reranked: Vec<RerankedHit>,
    pub threshold: Option<ThresholdDecision>,
    pub snippet_anchors: Vec<SnippetAnchor>,
    stage_timings: PipelineStageTimings,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        identity: &'a RepoIdentity,
        queries: &'a [String],
        config: &'a RetrievalConfig,
        collaborators: RetrievalCollaborators<'a>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            queries,
            config,
            collaborators,
            now,
            outcomes: Vec::new(),
            candidate_count: 0,
            shared_pool_used: false,
            merged: Vec::new(),
            reranked: Vec::new(),
            threshold: None,
            snippet_anchors: Vec::new(),
            stage_timings: PipelineStageTimings::default(),
        }
    }

    pub fn record_stage_duration(&mut self, kind: StageKind, duration: std::time::Duration) {
        self.stage_timings.record(kind, duration);
    }

    pub fn into_result(self) -> RetrieveResult {
        let decision = self.threshold.unwrap_or_else(|| {
            ThresholdDecision::configured(self.config.distance_threshold, self.reranked.len())
        });
        let variant_failures = self
            .outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().cloned())
            .collect();

        RetrieveResult {
            findings: self.reranked,
            snippet_anchors: self.snippet_anchors,
            provenance: Provenance {
                query_count: self.queries.len(),
                candidate_count: self.candidate_count,
                shared_pool_used: self.shared_pool_used,
                threshold_method: decision.method,
                threshold_value: decision.threshold,
            },
            stage_timings: self.stage_timings,
            variant_failures,
        }
    }
}

/// The fixed stage order of a knowledge retrieval run.
pub fn default_stages() -> Vec<BoxedStage> {
    vec![
        Box::new(VariantSearchStage),
        Box::new(MergeStage),
        Box::new(LanguageRerankStage),
        Box::new(RecencyRerankStage),
        Box::new(ThresholdStage),
        Box::new(AnchorStage),
    ]
}

#[derive(Debug, Clone, Copy)]
pub struct VariantSearchStage;

#[async_trait]
impl PipelineStage for VariantSearchStage {
    fn kind(&self) -> StageKind {
        StageKind::VariantSearch
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        search_variants(ctx).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MergeStage;

#[async_trait]
impl PipelineStage for MergeStage {
    fn kind(&self) -> StageKind {
        StageKind::Merge
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        merge(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LanguageRerankStage;

#[async_trait]
impl PipelineStage for LanguageRerankStage {
    fn kind(&self) -> StageKind {
        StageKind::LanguageRerank
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        language_rerank(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecencyRerankStage;

#[async_trait]
impl PipelineStage for RecencyRerankStage {
    fn kind(&self) -> StageKind {
        StageKind::RecencyRerank
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        recency_rerank(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdStage;

#[async_trait]
impl PipelineStage for ThresholdStage {
    fn kind(&self) -> StageKind {
        StageKind::Threshold
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        apply_threshold(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnchorStage;

#[async_trait]
impl PipelineStage for AnchorStage {
    fn kind(&self) -> StageKind {
        StageKind::Anchor
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        anchor_snippets(ctx);
        Ok(())
    }
}

#[instrument(skip_all, fields(variants = ctx.queries.len()))]
pub async fn search_variants(ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
    ctx.config.validate()?;

    let variants = build_variants(ctx.queries);
    let variant_count = variants.len();
    let per_variant = per_variant_top_k(ctx.config.top_k, variant_count);
    let identity = ctx.identity;
    let config = ctx.config;
    let collaborators = ctx.collaborators;

    let mut outcomes: Vec<VariantOutcome> = stream::iter(variants.into_iter().enumerate())
        .map(move |(index, variant)| async move {
            run_variant(index, &variant, identity, config, collaborators, per_variant).await
        })
        .buffer_unordered(config.variant_concurrency.max(1))
        .collect()
        .await;
    outcomes.sort_by_key(|outcome| outcome.index);

    debug!(
        variants = variant_count,
        per_variant_top_k = per_variant,
        failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
        "Variant searches settled"
    );

    ctx.outcomes = outcomes;
    Ok(())
}

async fn run_variant(
    index: usize,
    variant: &RetrievalVariant,
    identity: &RepoIdentity,
    config: &RetrievalConfig,
    collaborators: RetrievalCollaborators<'_>,
    top_k: usize,
) -> VariantOutcome {
    let attempt = AssertUnwindSafe(search_variant(variant, identity, config, collaborators, top_k))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err((VariantFailureKind::Panicked, panic_message(&*panic))));

    let result = match attempt {
        Ok(found) => {
            debug!(
                index,
                variant = %variant.variant_type,
                hits = found.results.len(),
                "Variant search complete"
            );
            Ok(found)
        }
        Err((kind, message)) => {
            if kind == VariantFailureKind::EmbeddingUnavailable {
                debug!(index, variant = %variant.variant_type, "No embedding for variant query");
            } else {
                warn!(
                    index,
                    variant = %variant.variant_type,
                    failure = %kind,
                    error = %message,
                    "Retrieval variant failed; continuing without its results"
                );
            }
            Err(VariantFailure {
                index,
                variant_type: variant.variant_type,
                kind,
                message,
            })
        }
    };

    VariantOutcome {
        index,
        variant_type: variant.variant_type,
        result,
    }
}

async fn search_variant(
    variant: &RetrievalVariant,
    identity: &RepoIdentity,
    config: &RetrievalConfig,
    collaborators: RetrievalCollaborators<'_>,
    top_k: usize,
) -> Result<IsolationResult, (VariantFailureKind, String)> {
    let embedding = match collaborators
        .embedder
        .generate(&variant.query, EmbeddingMode::Query)
        .await
    {
        Ok(Some(embedding)) => embedding,
        Ok(None) => {
            return Err((
                VariantFailureKind::EmbeddingUnavailable,
                "embedding provider returned no vector".to_string(),
            ))
        }
        Err(err) => return Err((VariantFailureKind::EmbeddingFailed, err.to_string())),
    };

    let request = IsolationRequest {
        query_embedding: embedding.embedding,
        owner: identity.owner.clone(),
        repo: identity.repo.clone(),
        sharing_enabled: config.sharing_enabled,
        top_k,
        distance_threshold: config.distance_threshold,
        adaptive: config.adaptive,
    };
    collaborators
        .search
        .retrieve_with_isolation(request)
        .await
        .map_err(|err| (VariantFailureKind::SearchFailed, err.to_string()))
}

/// Pools every variant's hits, one per record id.
///
/// The lowest distance wins; an exact tie keeps the earlier variant's hit.
/// Output is ascending by distance, then id, and capped to `top_k`.
pub fn merge_variant_hits(outcomes: &[VariantOutcome], top_k: usize) -> Vec<RetrievalHit> {
    let mut ordered: Vec<&VariantOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|outcome| outcome.index);

    let mut best: HashMap<&str, &RetrievalHit> = HashMap::new();
    for outcome in ordered {
        let Ok(found) = &outcome.result else {
            continue;
        };
        for hit in &found.results {
            best.entry(hit.record.id.as_str())
                .and_modify(|current| {
                    if hit.distance.total_cmp(&current.distance).is_lt() {
                        *current = hit;
                    }
                })
                .or_insert(hit);
        }
    }

    let mut merged: Vec<RetrievalHit> = best.into_values().cloned().collect();
    merged.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    merged.truncate(top_k);
    merged
}

#[instrument(skip_all)]
pub fn merge(ctx: &mut PipelineContext<'_>) {
    let requesting_repo = ctx.identity.full_name();

    let mut candidate_count = 0usize;
    let mut shared_pool_used = false;
    for found in ctx.outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        candidate_count = candidate_count.saturating_add(found.results.len());
        shared_pool_used |= found.provenance.shared_pool_used
            || found
                .results
                .iter()
                .any(|hit| hit.source_repo != requesting_repo);
    }

    ctx.merged = merge_variant_hits(&ctx.outcomes, ctx.config.top_k);
    ctx.candidate_count = candidate_count;
    ctx.shared_pool_used = shared_pool_used;

    debug!(
        candidate_count,
        merged = ctx.merged.len(),
        shared_pool_used,
        "Merged variant results"
    );
}

#[instrument(skip_all)]
pub fn language_rerank(ctx: &mut PipelineContext<'_>) {
    if ctx.merged.is_empty() {
        return;
    }
    let merged = std::mem::take(&mut ctx.merged);
    ctx.reranked = rerank_by_language(merged, &ctx.config.pr_languages, &ctx.config.language_boost);
}

#[instrument(skip_all)]
pub fn recency_rerank(ctx: &mut PipelineContext<'_>) {
    if ctx.reranked.is_empty() {
        return;
    }
    match ctx.collaborators.recency.apply(&ctx.reranked, ctx.now) {
        Ok(weighted) => ctx.reranked = weighted,
        Err(err) => {
            warn!(error = %err, "Recency weighting failed; keeping language order");
        }
    }
}

#[instrument(skip_all, fields(adaptive = ctx.config.adaptive))]
pub fn apply_threshold(ctx: &mut PipelineContext<'_>) {
    let configured = ctx.config.distance_threshold;

    if !ctx.config.adaptive || ctx.reranked.is_empty() {
        ctx.threshold = Some(ThresholdDecision::configured(
            configured,
            ctx.reranked.len(),
        ));
    } else {
        let distances: Vec<f64> = ctx.reranked.iter().map(|h| h.adjusted_distance).collect();
        let decision = match ctx.collaborators.threshold.compute(&distances, configured) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(error = %err, "Adaptive threshold failed; using configured ceiling");
                ThresholdDecision {
                    method: ThresholdMethod::Ceiling,
                    threshold: configured,
                    candidate_count: distances.iter().filter(|d| **d <= configured).count(),
                }
            }
        };

        let before = ctx.reranked.len();
        ctx.reranked
            .retain(|hit| hit.adjusted_distance <= decision.threshold);
        debug!(
            method = %decision.method,
            threshold = decision.threshold,
            dropped = before.saturating_sub(ctx.reranked.len()),
            "Applied adaptive threshold"
        );
        ctx.threshold = Some(decision);
    }

    ctx.reranked.truncate(ctx.config.top_k);
}

#[instrument(skip_all)]
pub fn anchor_snippets(ctx: &mut PipelineContext<'_>) {
    let Some(workspace_dir) = ctx.config.workspace_dir.as_deref() else {
        return;
    };
    if ctx.reranked.is_empty() {
        return;
    }

    let findings: Vec<AnchorFinding> = ctx
        .reranked
        .iter()
        .map(|hit| AnchorFinding {
            path: hit.record().file_path.clone(),
            line: hit.record().line,
            text: hit.record().finding_text.clone(),
            distance: hit.adjusted_distance,
        })
        .collect();

    let anchors = build_snippet_anchors(workspace_dir, &findings, ctx.collaborators.file_reader);
    ctx.snippet_anchors =
        trim_snippet_anchors(anchors, ctx.config.top_k, ctx.config.max_context_chars);
}
