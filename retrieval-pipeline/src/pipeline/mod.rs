mod config;
mod diagnostics;
mod stages;
mod variants;

pub use config::{RepoIdentity, RetrievalConfig, RetrievalOverrides};
pub use diagnostics::{VariantFailure, VariantFailureKind};
pub use stages::{merge_variant_hits, VariantOutcome};
pub use variants::{build_variants, per_variant_top_k, RetrievalVariant, VariantType};

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    types::{anchor::SnippetAnchor, finding::RerankedHit, provenance::Provenance},
    utils::embedding::EmbeddingProvider,
};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::{
    isolation::IsolationSearch, recency::RecencyWeighting, snippets::FileReader,
    threshold::AdaptiveThreshold,
};
use stages::{default_stages, PipelineContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    VariantSearch,
    Merge,
    LanguageRerank,
    RecencyRerank,
    Threshold,
    Anchor,
}

#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn kind(&self) -> StageKind;
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError>;
}

pub type BoxedStage = Box<dyn PipelineStage>;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineStageTimings {
    timings: Vec<(StageKind, Duration)>,
}

impl PipelineStageTimings {
    pub fn record(&mut self, kind: StageKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    pub fn into_vec(self) -> Vec<(StageKind, Duration)> {
        self.timings
    }

    pub fn stage_ms(&self, kind: StageKind) -> u128 {
        self.timings
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, d)| d.as_millis())
    }

    pub fn total(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}

/// The external capabilities a retrieval run depends on.
#[derive(Clone, Copy)]
pub struct RetrievalCollaborators<'a> {
    pub embedder: &'a dyn EmbeddingProvider,
    pub search: &'a dyn IsolationSearch,
    pub threshold: &'a dyn AdaptiveThreshold,
    pub recency: &'a dyn RecencyWeighting,
    pub file_reader: &'a dyn FileReader,
}

#[derive(Debug, Clone)]
pub struct RetrieveResult {
    /// Ascending by adjusted distance, capped to `top_k`.
    pub findings: Vec<RerankedHit>,
    pub snippet_anchors: Vec<SnippetAnchor>,
    pub provenance: Provenance,
    pub stage_timings: PipelineStageTimings,
    pub variant_failures: Vec<VariantFailure>,
}

impl RetrieveResult {
    /// What a failed run returns: attempted, nothing found.
    pub fn empty(query_count: usize, configured_threshold: f64) -> Self {
        Self {
            findings: Vec::new(),
            snippet_anchors: Vec::new(),
            provenance: Provenance::empty(query_count, configured_threshold),
            stage_timings: PipelineStageTimings::default(),
            variant_failures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Runs every stage in order. `None` means retrieval was skipped on purpose;
/// any failure after that point yields an empty result instead of an error.
pub async fn run_pipeline(
    identity: &RepoIdentity,
    queries: &[String],
    config: &RetrievalConfig,
    collaborators: RetrievalCollaborators<'_>,
    now: DateTime<Utc>,
) -> Option<RetrieveResult> {
    if !config.enabled {
        debug!("Knowledge retrieval disabled; skipping");
        return None;
    }
    if queries.is_empty() {
        debug!("No retrieval queries supplied; skipping");
        return None;
    }

    info!(
        queries = queries.len(),
        top_k = config.top_k,
        adaptive = config.adaptive,
        sharing_enabled = config.sharing_enabled,
        "Starting knowledge retrieval pipeline"
    );

    let ctx = PipelineContext::new(identity, queries, config, collaborators, now);
    let outcome = AssertUnwindSafe(run_stages(ctx)).catch_unwind().await;

    match outcome {
        Ok(Ok(result)) => {
            info!(
                findings = result.findings.len(),
                anchors = result.snippet_anchors.len(),
                candidate_count = result.provenance.candidate_count,
                threshold_method = %result.provenance.threshold_method,
                elapsed_ms = result.stage_timings.total().as_millis(),
                "Knowledge retrieval complete"
            );
            Some(result)
        }
        Ok(Err(err)) => {
            warn!(error = %err, "Knowledge retrieval failed; continuing without prior findings");
            Some(RetrieveResult::empty(queries.len(), config.distance_threshold))
        }
        Err(panic) => {
            warn!(
                panic = %panic_message(&*panic),
                "Knowledge retrieval panicked; continuing without prior findings"
            );
            Some(RetrieveResult::empty(queries.len(), config.distance_threshold))
        }
    }
}

async fn run_stages(mut ctx: PipelineContext<'_>) -> Result<RetrieveResult, AppError> {
    for stage in default_stages() {
        let start = Instant::now();
        stage.execute(&mut ctx).await?;
        ctx.record_stage_duration(stage.kind(), start.elapsed());
    }
    Ok(ctx.into_result())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        fs,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use common::{
        types::{
            finding::{FindingRecord, RetrievalHit},
            provenance::ThresholdMethod,
        },
        utils::{
            config::{GapThresholdParams, RecencyParams},
            embedding::{EmbeddingMode, QueryEmbedding},
        },
    };

    use crate::{
        isolation::{IsolationProvenance, IsolationRequest, IsolationResult},
        recency::RecencyDecay,
        snippets::FsFileReader,
        threshold::GapThreshold,
    };

    /// Embeds each known query as `[position]` so the search double can tell
    /// variants apart regardless of scheduling.
    struct ScriptedEmbedder {
        keys: HashMap<String, Option<f32>>,
    }

    impl ScriptedEmbedder {
        fn new(entries: &[(&str, Option<f32>)]) -> Self {
            Self {
                keys: entries
                    .iter()
                    .map(|(query, key)| ((*query).to_string(), *key))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedEmbedder {
        async fn generate(
            &self,
            text: &str,
            _mode: EmbeddingMode,
        ) -> Result<Option<QueryEmbedding>, AppError> {
            match self.keys.get(text) {
                Some(Some(key)) => Ok(Some(QueryEmbedding {
                    embedding: vec![*key],
                    model: "scripted".into(),
                    dimensions: 1,
                })),
                Some(None) => Ok(None),
                None => Err(AppError::Embedding(format!("no script for {text}"))),
            }
        }
    }

    #[derive(Default)]
    struct ScriptedSearch {
        responses: HashMap<u32, Result<Vec<RetrievalHit>, String>>,
        shared_pool: bool,
        panic_on: Option<u32>,
        delay_ms: u64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        requested_top_k: AtomicUsize,
    }

    impl ScriptedSearch {
        fn respond(mut self, key: u32, hits: Vec<RetrievalHit>) -> Self {
            self.responses.insert(key, Ok(hits));
            self
        }

        fn fail(mut self, key: u32, message: &str) -> Self {
            self.responses.insert(key, Err(message.to_string()));
            self
        }
    }

    #[async_trait]
    impl IsolationSearch for ScriptedSearch {
        async fn retrieve_with_isolation(
            &self,
            request: IsolationRequest,
        ) -> Result<IsolationResult, AppError> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            self.requested_top_k
                .store(request.top_k, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let key = request
                .query_embedding
                .first()
                .map_or(u32::MAX, |key| *key as u32);
            if self.panic_on == Some(key) {
                panic!("vector shard {key} corrupted");
            }
            match self.responses.get(&key) {
                Some(Ok(hits)) => Ok(IsolationResult {
                    results: hits.clone(),
                    provenance: IsolationProvenance {
                        shared_pool_used: self.shared_pool,
                    },
                }),
                Some(Err(message)) => Err(AppError::Search(message.clone())),
                None => Ok(IsolationResult::default()),
            }
        }
    }

    struct PanickingRecency;

    impl RecencyWeighting for PanickingRecency {
        fn apply(
            &self,
            _hits: &[RerankedHit],
            _now: DateTime<Utc>,
        ) -> Result<Vec<RerankedHit>, AppError> {
            panic!("recency store unavailable");
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("retrieval_pipeline=debug")
            .with_test_writer()
            .try_init();
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-04-01T00:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn identity() -> RepoIdentity {
        RepoIdentity::new("acme", "widgets")
    }

    fn hit(id: &str, distance: f64) -> RetrievalHit {
        RetrievalHit::new(
            FindingRecord::new(id, "acme/widgets", format!("src/{id}.rs"), format!("finding {id}")),
            distance,
        )
    }

    fn queries(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    const GAP: GapThreshold = GapThreshold::new(GapThresholdParams {
        min_gap: 0.05,
        gap_ratio: 2.0,
        min_keep: 1,
    });
    const DECAY: RecencyDecay = RecencyDecay::new(RecencyParams {
        window_days: 30,
        boost_factor: 0.15,
    });

    fn collaborators<'a>(
        embedder: &'a ScriptedEmbedder,
        search: &'a ScriptedSearch,
    ) -> RetrievalCollaborators<'a> {
        RetrievalCollaborators {
            embedder,
            search,
            threshold: &GAP,
            recency: &DECAY,
            file_reader: &FsFileReader,
        }
    }

    #[tokio::test]
    async fn skipped_when_disabled_or_without_queries() {
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default();
        let disabled = RetrievalConfig {
            enabled: false,
            ..RetrievalConfig::default()
        };

        assert!(run_pipeline(
            &identity(),
            &queries(&["q"]),
            &disabled,
            collaborators(&embedder, &search),
            now()
        )
        .await
        .is_none());
        assert!(run_pipeline(
            &identity(),
            &[],
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now()
        )
        .await
        .is_none());
        assert_eq!(search.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn merges_variants_and_reports_provenance() {
        init_tracing();
        let embedder = ScriptedEmbedder::new(&[("intent", Some(0.0)), ("path", Some(1.0))]);
        let search = ScriptedSearch::default()
            .respond(0, vec![hit("a", 0.10), hit("b", 0.20)])
            .respond(1, vec![hit("a", 0.05), hit("c", 0.25)]);

        let result = run_pipeline(
            &identity(),
            &queries(&["intent", "path"]),
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        let ids: Vec<&str> = result.findings.iter().map(|f| f.record().id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!((result.findings[0].adjusted_distance - 0.05).abs() < f64::EPSILON);
        assert_eq!(result.provenance.query_count, 2);
        assert_eq!(result.provenance.candidate_count, 4);
        assert!(!result.provenance.shared_pool_used);
        assert_ne!(result.provenance.threshold_method, ThresholdMethod::Configured);
        assert!(result.variant_failures.is_empty());
        assert!(result.snippet_anchors.is_empty());
        assert_eq!(search.requested_top_k.load(Ordering::SeqCst), 3);
        assert_eq!(result.stage_timings.into_vec().len(), 6);
    }

    #[tokio::test]
    async fn adaptive_gap_drops_distant_cluster() {
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default().respond(
            0,
            vec![hit("a", 0.02), hit("b", 0.03), hit("c", 0.04), hit("far", 0.28)],
        );

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert_eq!(result.provenance.threshold_method, ThresholdMethod::GapDetection);
        assert!((result.provenance.threshold_value - 0.04).abs() < f64::EPSILON);
        assert_eq!(result.findings.len(), 3);
        assert!(result.findings.iter().all(|f| f.record().id != "far"));
    }

    #[tokio::test]
    async fn non_adaptive_runs_report_configured_threshold() {
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default()
            .respond(0, vec![hit("a", 0.02), hit("b", 0.03), hit("far", 0.28)]);
        let config = RetrievalConfig::with_overrides(RetrievalOverrides {
            adaptive: Some(false),
            distance_threshold: Some(0.25),
            ..RetrievalOverrides::default()
        });

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &config,
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert_eq!(result.provenance.threshold_method, ThresholdMethod::Configured);
        assert!((result.provenance.threshold_value - 0.25).abs() < f64::EPSILON);
        assert_eq!(result.findings.len(), 3);
    }

    #[tokio::test]
    async fn failing_variants_do_not_sink_siblings() {
        init_tracing();
        let embedder = ScriptedEmbedder::new(&[
            ("works", Some(0.0)),
            ("search-breaks", Some(1.0)),
            ("no-vector", None),
        ]);
        let search = ScriptedSearch::default()
            .respond(0, vec![hit("a", 0.1)])
            .fail(1, "index offline");

        let result = run_pipeline(
            &identity(),
            &queries(&["works", "search-breaks", "no-vector", "unscripted"]),
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.provenance.candidate_count, 1);
        let kinds: Vec<VariantFailureKind> =
            result.variant_failures.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                VariantFailureKind::SearchFailed,
                VariantFailureKind::EmbeddingUnavailable,
                VariantFailureKind::EmbeddingFailed,
            ]
        );
        assert_eq!(result.variant_failures[0].variant_type, VariantType::FilePath);
    }

    #[tokio::test]
    async fn panicking_variant_is_recorded_and_siblings_survive() {
        init_tracing();
        let embedder = ScriptedEmbedder::new(&[("fine", Some(0.0)), ("explodes", Some(1.0))]);
        let search = ScriptedSearch {
            panic_on: Some(1),
            ..ScriptedSearch::default()
        }
        .respond(0, vec![hit("a", 0.1), hit("b", 0.12)]);

        let result = run_pipeline(
            &identity(),
            &queries(&["fine", "explodes"]),
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        let ids: Vec<&str> = result.findings.iter().map(|f| f.record().id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(result.provenance.candidate_count, 2);
        assert_eq!(result.variant_failures.len(), 1);
        let failure = &result.variant_failures[0];
        assert_eq!(failure.kind, VariantFailureKind::Panicked);
        assert_eq!(failure.index, 1);
        assert_eq!(failure.variant_type, VariantType::FilePath);
        assert_eq!(failure.message, "vector shard 1 corrupted");
    }

    #[tokio::test]
    async fn pr_languages_reorder_findings() {
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let python = RetrievalHit::new(
            FindingRecord::new("py", "acme/widgets", "tools/lint.py", "finding py"),
            0.10,
        );
        let rust = RetrievalHit::new(
            FindingRecord::new("rs", "acme/widgets", "scripts/build", "finding rs")
                .with_language("Rust"),
            0.11,
        );
        let search = ScriptedSearch::default().respond(0, vec![python, rust]);
        let config = RetrievalConfig::with_overrides(RetrievalOverrides {
            pr_languages: vec!["rust".into()],
            ..RetrievalOverrides::default()
        });

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &config,
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        let summary: Vec<(&str, bool)> = result
            .findings
            .iter()
            .map(|f| (f.record().id.as_str(), f.language_match))
            .collect();
        assert_eq!(summary, vec![("rs", true), ("py", false)]);
        assert!((result.findings[0].adjusted_distance - 0.11 * 0.85).abs() < 1e-12);
        assert!((result.findings[0].hit.distance - 0.11).abs() < f64::EPSILON);
        assert!((result.findings[1].adjusted_distance - 0.10).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn invalid_config_fails_open_before_searching() {
        init_tracing();
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default().respond(0, vec![hit("a", 0.1)]);
        let config = RetrievalConfig {
            distance_threshold: f64::NAN,
            ..RetrievalConfig::default()
        };

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &config,
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("failures still yield a result");

        assert!(result.is_empty());
        assert!(result.variant_failures.is_empty());
        assert!(result.stage_timings.is_empty());
        assert_eq!(result.stage_timings.stage_ms(StageKind::VariantSearch), 0);
        assert_eq!(result.provenance.query_count, 1);
        assert_eq!(result.provenance.threshold_method, ThresholdMethod::Configured);
        assert_eq!(search.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn at_most_two_variants_search_at_once() {
        let entries: Vec<(String, Option<f32>)> = (0..5u8)
            .map(|i| (format!("q{i}"), Some(f32::from(i))))
            .collect();
        let embedder = ScriptedEmbedder {
            keys: entries.into_iter().collect(),
        };
        let search = ScriptedSearch {
            delay_ms: 20,
            ..ScriptedSearch::default()
        };

        let result = run_pipeline(
            &identity(),
            &queries(&["q0", "q1", "q2", "q3", "q4"]),
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert!(result.is_empty());
        assert_eq!(search.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(search.requested_top_k.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn foreign_hits_mark_shared_pool_usage() {
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let foreign = hit("shared", 0.1).from_repo("other/service");
        let search = ScriptedSearch::default().respond(0, vec![foreign]);

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &RetrievalConfig::default(),
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert!(result.provenance.shared_pool_used);
    }

    #[tokio::test]
    async fn panicking_stage_fails_open() {
        init_tracing();
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default().respond(0, vec![hit("a", 0.1)]);
        let collaborators = RetrievalCollaborators {
            recency: &PanickingRecency,
            ..collaborators(&embedder, &search)
        };

        let result = run_pipeline(
            &identity(),
            &queries(&["q", "q2"]),
            &RetrievalConfig::default(),
            collaborators,
            now(),
        )
        .await
        .expect("failures still yield a result");

        assert!(result.findings.is_empty());
        assert!(result.snippet_anchors.is_empty());
        assert_eq!(result.provenance.query_count, 2);
        assert_eq!(result.provenance.candidate_count, 0);
        assert_eq!(result.provenance.threshold_method, ThresholdMethod::Configured);
    }

    #[tokio::test]
    async fn anchors_findings_inside_the_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src")).expect("mkdir");
        fs::write(
            dir.path().join("src/pool.rs"),
            "pub fn acquire() {\n    let conn = pool.checkout_blocking();\n}\n",
        )
        .expect("write fixture");

        let record = FindingRecord::new(
            "pool",
            "acme/widgets",
            "src/pool.rs",
            "checkout_blocking stalls the async executor",
        );
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default().respond(
            0,
            vec![RetrievalHit::new(record, 0.1), hit("gone", 0.12)],
        );
        let config = RetrievalConfig::with_overrides(RetrievalOverrides {
            workspace_dir: Some(dir.path().to_path_buf()),
            ..RetrievalOverrides::default()
        });

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &config,
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert_eq!(result.snippet_anchors.len(), 2);
        assert_eq!(result.snippet_anchors[0].anchor, "src/pool.rs:2");
        assert_eq!(
            result.snippet_anchors[0].snippet.as_deref(),
            Some("let conn = pool.checkout_blocking();")
        );
        assert_eq!(result.snippet_anchors[1].anchor, "src/gone.rs");
    }

    #[tokio::test]
    async fn stored_line_hint_picks_the_matching_occurrence() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src")).expect("mkdir");
        fs::write(
            dir.path().join("src/pool.rs"),
            "fn warm() {
    pool.checkout_blocking();
}

fn serve() {
    let conn = pool.checkout_blocking();
}
",
        )
        .expect("write fixture");

        let record = FindingRecord::new(
            "serve",
            "acme/widgets",
            "src/pool.rs",
            "checkout_blocking stalls the async executor",
        )
        .with_line(6);
        let embedder = ScriptedEmbedder::new(&[("q", Some(0.0))]);
        let search = ScriptedSearch::default().respond(0, vec![RetrievalHit::new(record, 0.1)]);
        let config = RetrievalConfig::with_overrides(RetrievalOverrides {
            workspace_dir: Some(dir.path().to_path_buf()),
            ..RetrievalOverrides::default()
        });

        let result = run_pipeline(
            &identity(),
            &queries(&["q"]),
            &config,
            collaborators(&embedder, &search),
            now(),
        )
        .await
        .expect("enabled run yields a result");

        assert_eq!(result.snippet_anchors.len(), 1);
        assert_eq!(result.snippet_anchors[0].anchor, "src/pool.rs:6");
        assert_eq!(result.snippet_anchors[0].line, Some(6));
        assert_eq!(
            result.snippet_anchors[0].snippet.as_deref(),
            Some("let conn = pool.checkout_blocking();")
        );
    }
}
