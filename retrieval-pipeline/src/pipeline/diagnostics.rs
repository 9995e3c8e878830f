use std::fmt;

use serde::Serialize;

use super::variants::VariantType;

/// Why a variant contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantFailureKind {
    /// The embedding provider had no vector for the query.
    EmbeddingUnavailable,
    EmbeddingFailed,
    SearchFailed,
    Panicked,
}

impl fmt::Display for VariantFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VariantFailureKind::EmbeddingUnavailable => "embedding-unavailable",
            VariantFailureKind::EmbeddingFailed => "embedding-failed",
            VariantFailureKind::SearchFailed => "search-failed",
            VariantFailureKind::Panicked => "panicked",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantFailure {
    pub index: usize,
    pub variant_type: VariantType,
    pub kind: VariantFailureKind,
    pub message: String,
}
