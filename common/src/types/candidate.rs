use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Corpus a candidate originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorpusSource {
    CodeFinding,
    ReviewComment,
    WikiPage,
}

impl fmt::Display for CorpusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CorpusSource::CodeFinding => "code-finding",
            CorpusSource::ReviewComment => "review-comment",
            CorpusSource::WikiPage => "wiki-page",
        };
        f.write_str(label)
    }
}

/// Scope of near-duplicate comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMode {
    /// Only candidates sharing a `source` are compared.
    #[default]
    WithinCorpus,
    /// Every candidate is compared against every kept candidate.
    CrossCorpus,
}

/// The unit of ranking shared by every corpus (a.k.a. unified chunk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalCandidate {
    pub id: String,
    pub text: String,
    pub source: CorpusSource,
    pub source_label: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub vector_distance: Option<f64>,
    /// Fusion score, higher is better.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_sources: Vec<String>,
}

impl RetrievalCandidate {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source: CorpusSource,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source,
            source_label: source_label.into(),
            source_url: None,
            vector_distance: None,
            score: 0.0,
            created_at: None,
            metadata: serde_json::Value::Null,
            alternate_sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_vector_distance(mut self, distance: f64) -> Self {
        self.vector_distance = Some(distance);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Records a citation label absorbed from a duplicate, keeping insertion
    /// order and skipping labels already present.
    pub fn push_alternate_source(&mut self, label: &str) {
        if !self.alternate_sources.iter().any(|existing| existing == label) {
            self.alternate_sources.push(label.to_owned());
        }
    }
}

/// Best-first candidates from one corpus or query. Only the position of an
/// item is read by fusion; its `score` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSourceList {
    pub source: CorpusSource,
    pub items: Vec<RetrievalCandidate>,
}

impl RankedSourceList {
    pub fn new(source: CorpusSource, items: Vec<RetrievalCandidate>) -> Self {
        Self { source, items }
    }
}
