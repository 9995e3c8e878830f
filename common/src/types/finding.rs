use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prior code finding as stored by the knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingRecord {
    pub id: String,
    /// `owner/name` of the repository the finding was recorded in.
    pub repo: String,
    pub file_path: String,
    #[serde(default)]
    pub line: Option<u32>,
    pub finding_text: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Stored language; older records may lack it.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl FindingRecord {
    pub fn new(
        id: impl Into<String>,
        repo: impl Into<String>,
        file_path: impl Into<String>,
        finding_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            repo: repo.into(),
            file_path: file_path.into(),
            line: None,
            finding_text: finding_text.into(),
            severity: None,
            category: None,
            language: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// One vector-search result as returned by the isolation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalHit {
    pub record: FindingRecord,
    /// Lower is more similar.
    pub distance: f64,
    /// Repository whose partition produced this hit; differs from the
    /// requesting repository when the shared pool answered.
    pub source_repo: String,
}

impl RetrievalHit {
    pub fn new(record: FindingRecord, distance: f64) -> Self {
        let source_repo = record.repo.clone();
        Self {
            record,
            distance,
            source_repo,
        }
    }

    #[must_use]
    pub fn from_repo(mut self, source_repo: impl Into<String>) -> Self {
        self.source_repo = source_repo.into();
        self
    }
}

/// A hit after reranking, carrying the adjusted distance every later stage
/// sorts and filters on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankedHit {
    pub hit: RetrievalHit,
    pub adjusted_distance: f64,
    pub language_match: bool,
}

impl RerankedHit {
    pub fn unadjusted(hit: RetrievalHit) -> Self {
        let adjusted_distance = hit.distance;
        Self {
            hit,
            adjusted_distance,
            language_match: false,
        }
    }

    pub fn record(&self) -> &FindingRecord {
        &self.hit.record
    }
}
