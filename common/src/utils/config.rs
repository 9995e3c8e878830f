use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::{error::AppError, types::candidate::DedupMode};

/// Request-level retrieval knobs. Per-request overrides are layered on top of
/// these by the orchestrator.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct RetrievalSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    #[serde(default = "default_true")]
    pub adaptive: bool,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default)]
    pub sharing_enabled: bool,
    #[serde(default = "default_variant_concurrency")]
    pub variant_concurrency: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
            distance_threshold: default_distance_threshold(),
            adaptive: true,
            max_context_chars: default_max_context_chars(),
            sharing_enabled: false,
            variant_concurrency: default_variant_concurrency(),
        }
    }
}

/// Parameters for reciprocal rank fusion.
#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
pub struct FusionParams {
    /// Smoothing constant; rank `r` contributes `1 / (k + r)`.
    #[serde(default = "default_rrf_k")]
    pub k: f64,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default = "default_recency_days")]
    pub recency_boost_days: i64,
    #[serde(default = "default_recency_factor")]
    pub recency_boost_factor: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            k: default_rrf_k(),
            top_k: None,
            recency_boost_days: default_recency_days(),
            recency_boost_factor: default_recency_factor(),
        }
    }
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
pub struct DedupParams {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub mode: DedupMode,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            mode: DedupMode::default(),
        }
    }
}

/// Distance multipliers for language affinity. Lower distance ranks higher.
#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
pub struct LanguageBoost {
    #[serde(default = "default_same_language_boost")]
    pub same_language_boost: f64,
    #[serde(default = "default_related_language_ratio")]
    pub related_language_ratio: f64,
}

impl Default for LanguageBoost {
    fn default() -> Self {
        Self {
            same_language_boost: default_same_language_boost(),
            related_language_ratio: default_related_language_ratio(),
        }
    }
}

impl LanguageBoost {
    /// Multiplier for a related (not identical) language.
    pub fn related_multiplier(&self) -> f64 {
        1.0 - (1.0 - self.same_language_boost) * self.related_language_ratio
    }
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
pub struct RecencyParams {
    #[serde(default = "default_recency_days")]
    pub window_days: i64,
    #[serde(default = "default_recency_factor")]
    pub boost_factor: f64,
}

impl Default for RecencyParams {
    fn default() -> Self {
        Self {
            window_days: default_recency_days(),
            boost_factor: default_recency_factor(),
        }
    }
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
pub struct GapThresholdParams {
    /// Smallest absolute gap treated as a cluster boundary.
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,
    /// How many times larger than the mean gap the boundary must be.
    #[serde(default = "default_gap_ratio")]
    pub gap_ratio: f64,
    /// Results always kept below the cut, even when the first gap is largest.
    #[serde(default = "default_min_keep")]
    pub min_keep: usize,
}

impl Default for GapThresholdParams {
    fn default() -> Self {
        Self {
            min_gap: default_min_gap(),
            gap_ratio: default_gap_ratio(),
            min_keep: default_min_keep(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub fusion: FusionParams,
    #[serde(default)]
    pub dedup: DedupParams,
    #[serde(default)]
    pub language: LanguageBoost,
    #[serde(default)]
    pub recency: RecencyParams,
    #[serde(default)]
    pub threshold: GapThresholdParams,
}

/// Longest recency window, in days, that a `chrono::Duration` can hold.
pub const MAX_RECENCY_WINDOW_DAYS: i64 = i64::MAX / 86_400_000;

impl KnowledgeConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let retrieval = &self.retrieval;
        if retrieval.top_k == 0 {
            return Err(AppError::Validation("retrieval.top_k must be > 0".into()));
        }
        if retrieval.variant_concurrency == 0 {
            return Err(AppError::Validation(
                "retrieval.variant_concurrency must be > 0".into(),
            ));
        }
        check_unit("retrieval.distance_threshold", retrieval.distance_threshold)?;

        if !self.fusion.k.is_finite() || self.fusion.k <= 0.0 {
            return Err(AppError::Validation(format!(
                "fusion.k must be > 0, got {}",
                self.fusion.k
            )));
        }
        if self.fusion.top_k == Some(0) {
            return Err(AppError::Validation("fusion.top_k must be > 0".into()));
        }
        check_window_days("fusion.recency_boost_days", self.fusion.recency_boost_days)?;
        check_non_negative("fusion.recency_boost_factor", self.fusion.recency_boost_factor)?;
        check_unit("dedup.similarity_threshold", self.dedup.similarity_threshold)?;

        let boost = self.language.same_language_boost;
        if !boost.is_finite() || boost <= 0.0 || boost > 1.0 {
            return Err(AppError::Validation(format!(
                "language.same_language_boost must be in (0, 1], got {boost}"
            )));
        }
        check_unit(
            "language.related_language_ratio",
            self.language.related_language_ratio,
        )?;
        check_window_days("recency.window_days", self.recency.window_days)?;
        check_non_negative("recency.boost_factor", self.recency.boost_factor)?;
        check_non_negative("threshold.min_gap", self.threshold.min_gap)?;
        check_non_negative("threshold.gap_ratio", self.threshold.gap_ratio)?;

        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{name} must be in [0.0, 1.0], got {value}"
        )))
    }
}

fn check_window_days(name: &str, days: i64) -> Result<(), AppError> {
    if (0..=MAX_RECENCY_WINDOW_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{name} must be in [0, {MAX_RECENCY_WINDOW_DAYS}], got {days}"
        )))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{name} must be a finite value >= 0, got {value}"
        )))
    }
}

const fn default_true() -> bool {
    true
}

const fn default_top_k() -> usize {
    5
}

const fn default_distance_threshold() -> f64 {
    0.3
}

const fn default_max_context_chars() -> usize {
    1200
}

const fn default_variant_concurrency() -> usize {
    2
}

const fn default_rrf_k() -> f64 {
    60.0
}

const fn default_recency_days() -> i64 {
    30
}

const fn default_recency_factor() -> f64 {
    0.15
}

const fn default_similarity_threshold() -> f64 {
    0.90
}

const fn default_same_language_boost() -> f64 {
    0.85
}

const fn default_related_language_ratio() -> f64 {
    0.5
}

const fn default_min_gap() -> f64 {
    0.05
}

const fn default_gap_ratio() -> f64 {
    2.0
}

const fn default_min_keep() -> usize {
    1
}

/// Loads configuration from an optional `knowledge.*` file and `KNOWLEDGE__*`
/// environment variables (e.g. `KNOWLEDGE__RETRIEVAL__TOP_K=8`).
pub fn get_config() -> Result<KnowledgeConfig, AppError> {
    get_config_from("knowledge")
}

pub fn get_config_from(file_name: &str) -> Result<KnowledgeConfig, AppError> {
    let config = Config::builder()
        .add_source(File::with_name(file_name).required(false))
        .add_source(
            Environment::with_prefix("KNOWLEDGE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let parsed: KnowledgeConfig = config.try_deserialize()?;
    parsed.validate()?;
    debug!(
        file = file_name,
        top_k = parsed.retrieval.top_k,
        adaptive = parsed.retrieval.adaptive,
        dedup_mode = ?parsed.dedup.mode,
        "Loaded knowledge configuration"
    );
    Ok(parsed)
}
