use common::{
    error::AppError,
    types::provenance::ThresholdMethod,
    utils::config::{GapThresholdParams, KnowledgeConfig},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The cutoff chosen for one retrieval run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdDecision {
    pub method: ThresholdMethod,
    /// Results with an adjusted distance above this value are dropped.
    pub threshold: f64,
    /// How many of the supplied distances pass the cutoff.
    pub candidate_count: usize,
}

impl ThresholdDecision {
    pub fn configured(threshold: f64, candidate_count: usize) -> Self {
        Self {
            method: ThresholdMethod::Configured,
            threshold,
            candidate_count,
        }
    }
}

/// Derives a distance cutoff from the distribution of result distances.
pub trait AdaptiveThreshold: Send + Sync {
    fn compute(&self, distances: &[f64], configured: f64) -> Result<ThresholdDecision, AppError>;
}

/// Cuts at the largest significant gap between consecutive sorted distances.
///
/// Only distances at or below the configured value are considered, so the
/// configured threshold always acts as a ceiling. The widest gap is a cluster
/// boundary when it is at least `min_gap` wide and at least `gap_ratio` times
/// the mean gap; the cutoff then sits on the last distance before it.
/// Without such a boundary the ceiling itself is the cutoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapThreshold {
    params: GapThresholdParams,
}

impl GapThreshold {
    pub const fn new(params: GapThresholdParams) -> Self {
        Self { params }
    }

    pub const fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(config.threshold)
    }
}

impl AdaptiveThreshold for GapThreshold {
    #[allow(clippy::cast_precision_loss)]
    fn compute(&self, distances: &[f64], configured: f64) -> Result<ThresholdDecision, AppError> {
        if !configured.is_finite() || configured < 0.0 {
            return Err(AppError::Threshold(format!(
                "configured threshold must be a finite value >= 0, got {configured}"
            )));
        }

        let mut eligible: Vec<f64> = distances
            .iter()
            .copied()
            .filter(|d| d.is_finite() && *d <= configured)
            .collect();
        eligible.sort_by(f64::total_cmp);

        let ceiling = ThresholdDecision {
            method: ThresholdMethod::Ceiling,
            threshold: configured,
            candidate_count: eligible.len(),
        };
        if eligible.len() < 2 {
            return Ok(ceiling);
        }

        let gaps: Vec<f64> = eligible
            .windows(2)
            .filter_map(|pair| match pair {
                [low, high] => Some(high - low),
                _ => None,
            })
            .collect();
        let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;

        // Cutting after index `i` keeps `i + 1` results.
        let min_keep = self.params.min_keep.max(1);
        let widest = gaps
            .iter()
            .enumerate()
            .skip(min_keep.saturating_sub(1))
            .fold(None::<(usize, f64)>, |best, (index, &gap)| match best {
                Some((_, widest)) if widest >= gap => best,
                _ => Some((index, gap)),
            });

        let Some((index, gap)) = widest else {
            return Ok(ceiling);
        };
        if gap < self.params.min_gap || gap < self.params.gap_ratio * mean_gap {
            debug!(gap, mean_gap, "No significant distance gap; using ceiling");
            return Ok(ceiling);
        }

        let Some(&cutoff) = eligible.get(index) else {
            return Ok(ceiling);
        };
        debug!(
            gap,
            mean_gap,
            cutoff,
            kept = index.saturating_add(1),
            "Adaptive threshold cut at distance gap"
        );
        Ok(ThresholdDecision {
            method: ThresholdMethod::GapDetection,
            threshold: cutoff,
            candidate_count: index.saturating_add(1),
        })
    }
}
