use std::fmt;

use serde::{Deserialize, Serialize};

/// How the distance cutoff of a run was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdMethod {
    /// The static configured threshold; used when adaptive selection is off.
    Configured,
    /// A cut at a significant gap in the distance distribution.
    GapDetection,
    /// Adaptive selection found no gap and fell back to the configured ceiling.
    Ceiling,
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ThresholdMethod::Configured => "configured",
            ThresholdMethod::GapDetection => "gap-detection",
            ThresholdMethod::Ceiling => "ceiling",
        };
        f.write_str(label)
    }
}

/// Audit metadata explaining how a result was produced. Carries no ranking
/// semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub query_count: usize,
    pub candidate_count: usize,
    pub shared_pool_used: bool,
    pub threshold_method: ThresholdMethod,
    pub threshold_value: f64,
}

impl Provenance {
    pub fn empty(query_count: usize, configured_threshold: f64) -> Self {
        Self {
            query_count,
            candidate_count: 0,
            shared_pool_used: false,
            threshold_method: ThresholdMethod::Configured,
            threshold_value: configured_threshold,
        }
    }
}
