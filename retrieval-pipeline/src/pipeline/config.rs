use std::{fmt, path::PathBuf};

use common::{
    error::AppError,
    utils::config::{KnowledgeConfig, LanguageBoost},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The repository a retrieval request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub repo: String,
}

impl RepoIdentity {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// `owner/repo`, the form stored on findings.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Per-request adjustments layered over the loaded configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOverrides {
    pub top_k: Option<usize>,
    pub distance_threshold: Option<f64>,
    pub adaptive: Option<bool>,
    pub max_context_chars: Option<usize>,
    pub pr_languages: Vec<String>,
    /// Checked-out PR workspace; snippet anchoring only runs when set.
    pub workspace_dir: Option<PathBuf>,
}

/// Effective settings for one retrieval run.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub distance_threshold: f64,
    pub adaptive: bool,
    pub max_context_chars: usize,
    pub sharing_enabled: bool,
    pub variant_concurrency: usize,
    pub pr_languages: Vec<String>,
    pub workspace_dir: Option<PathBuf>,
    pub language_boost: LanguageBoost,
}

impl RetrievalConfig {
    pub fn new(config: &KnowledgeConfig, overrides: RetrievalOverrides) -> Self {
        let settings = &config.retrieval;
        Self {
            enabled: settings.enabled,
            top_k: overrides.top_k.unwrap_or(settings.top_k).max(1),
            distance_threshold: overrides.distance_threshold.map_or(
                settings.distance_threshold,
                |requested| sanitize_threshold(requested, settings.distance_threshold),
            ),
            adaptive: overrides.adaptive.unwrap_or(settings.adaptive),
            max_context_chars: overrides
                .max_context_chars
                .unwrap_or(settings.max_context_chars),
            sharing_enabled: settings.sharing_enabled,
            variant_concurrency: settings.variant_concurrency.max(1),
            pr_languages: overrides.pr_languages,
            workspace_dir: overrides.workspace_dir,
            language_boost: config.language,
        }
    }

    pub fn with_overrides(overrides: RetrievalOverrides) -> Self {
        Self::new(&KnowledgeConfig::default(), overrides)
    }

    /// Rejects settings a run cannot honour. Fields are public, so a config
    /// built by hand may skip the clamping done in [`RetrievalConfig::new`].
    pub fn validate(&self) -> Result<(), AppError> {
        if self.top_k == 0 {
            return Err(AppError::Validation("top_k must be > 0".into()));
        }
        if self.variant_concurrency == 0 {
            return Err(AppError::Validation(
                "variant_concurrency must be > 0".into(),
            ));
        }
        let threshold = self.distance_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::Validation(format!(
                "distance_threshold must be in [0.0, 1.0], got {threshold}"
            )));
        }
        Ok(())
    }
}

/// Clamps a per-request threshold into `[0, 1]`; non-finite values fall back
/// to the loaded setting.
fn sanitize_threshold(requested: f64, loaded: f64) -> f64 {
    if !requested.is_finite() {
        warn!(requested, loaded, "Ignoring non-finite distance threshold override");
        return loaded;
    }
    let clamped = requested.clamp(0.0, 1.0);
    if (clamped - requested).abs() > f64::EPSILON {
        warn!(requested, clamped, "Clamped distance threshold override");
    }
    clamped
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new(&KnowledgeConfig::default(), RetrievalOverrides::default())
    }
}
