use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    types::finding::RerankedHit,
    utils::config::{KnowledgeConfig, RecencyParams},
};
use tracing::debug;

use crate::scoring::within_recency_window;

/// Rescores reranked hits by age. Implementations must return the same hits,
/// only with updated `adjusted_distance` and order.
pub trait RecencyWeighting: Send + Sync {
    fn apply(
        &self,
        hits: &[RerankedHit],
        now: DateTime<Utc>,
    ) -> Result<Vec<RerankedHit>, AppError>;
}

/// Shrinks the distance of findings recorded within the recency window.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecencyDecay {
    params: RecencyParams,
}

impl RecencyDecay {
    pub const fn new(params: RecencyParams) -> Self {
        Self { params }
    }

    pub const fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(config.recency)
    }
}

impl RecencyWeighting for RecencyDecay {
    fn apply(
        &self,
        hits: &[RerankedHit],
        now: DateTime<Utc>,
    ) -> Result<Vec<RerankedHit>, AppError> {
        let factor = self.params.boost_factor;
        if !factor.is_finite() || factor < 0.0 {
            return Err(AppError::Recency(format!(
                "boost factor must be a finite value >= 0, got {factor}"
            )));
        }

        let mut boosted = 0usize;
        let mut weighted: Vec<RerankedHit> = hits
            .iter()
            .cloned()
            .map(|mut hit| {
                if within_recency_window(hit.record().created_at, now, self.params.window_days) {
                    hit.adjusted_distance /= 1.0 + factor;
                    boosted = boosted.saturating_add(1);
                }
                hit
            })
            .collect();

        weighted.sort_by(|a, b| a.adjusted_distance.total_cmp(&b.adjusted_distance));

        debug!(
            results = weighted.len(),
            boosted,
            window_days = self.params.window_days,
            "Applied recency weighting"
        );
        Ok(weighted)
    }
}
