use std::{cmp::Ordering, collections::HashMap};

use chrono::{DateTime, Duration, Utc};
use common::{
    types::candidate::{RankedSourceList, RetrievalCandidate},
    utils::config::FusionParams,
};
use tracing::debug;

pub const DEFAULT_RRF_K: f64 = 60.0;

/// True when `created_at` lies in `[now - window_days, now]`. A window too
/// large for `Duration` matches nothing.
pub fn within_recency_window(
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window_days: i64,
) -> bool {
    let (Some(created_at), Some(window)) = (created_at, Duration::try_days(window_days)) else {
        return false;
    };
    let age = now.signed_duration_since(created_at);
    age >= Duration::zero() && age <= window
}

/// Descending by score. Incomparable scores compare equal so a stable sort
/// keeps their input order.
pub fn compare_score_desc(a: &RetrievalCandidate, b: &RetrievalCandidate) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
}

/// Total order used wherever output must not depend on input order: score
/// descending, then identity and citation fields ascending.
pub fn compare_score_desc_total(a: &RetrievalCandidate, b: &RetrievalCandidate) -> Ordering {
    compare_score_desc(a, b)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.source_label.cmp(&b.source_label))
        .then_with(|| a.text.cmp(&b.text))
}

/// Merges ranked lists with reciprocal rank fusion.
///
/// Rank `r` (0-based) in any list contributes `1 / (k + r)` to the item keyed
/// by `id`; an item present in several lists accumulates every contribution.
/// Candidates created within `recency_boost_days` of `now` are then multiplied
/// by `1 + recency_boost_factor`. The result is sorted by descending score,
/// ties keeping first-appearance order, and cut to `top_k` when set.
///
/// Citation fields (`source`, `source_label`, `source_url`) come from the
/// first list an item appears in.
#[allow(clippy::cast_precision_loss)]
pub fn reciprocal_rank_fusion(
    lists: &[RankedSourceList],
    params: &FusionParams,
    now: DateTime<Utc>,
) -> Vec<RetrievalCandidate> {
    let k = if params.k.is_finite() && params.k > 0.0 {
        params.k
    } else {
        DEFAULT_RRF_K
    };

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut fused: Vec<RetrievalCandidate> = Vec::new();

    for list in lists {
        for (rank, candidate) in list.items.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f64);
            match slots.get(&candidate.id) {
                Some(&slot) => {
                    if let Some(existing) = fused.get_mut(slot) {
                        existing.score += contribution;
                    }
                }
                None => {
                    let mut entry = candidate.clone();
                    entry.score = contribution;
                    slots.insert(candidate.id.clone(), fused.len());
                    fused.push(entry);
                }
            }
        }
    }

    let boosted = apply_recency_boost(&mut fused, params, now);

    fused.sort_by(compare_score_desc);
    if let Some(top_k) = params.top_k {
        fused.truncate(top_k);
    }

    debug!(
        lists = lists.len(),
        fused = fused.len(),
        boosted,
        "Reciprocal rank fusion complete"
    );
    fused
}

fn apply_recency_boost(
    candidates: &mut [RetrievalCandidate],
    params: &FusionParams,
    now: DateTime<Utc>,
) -> usize {
    let factor = if params.recency_boost_factor.is_finite() {
        params.recency_boost_factor.max(0.0)
    } else {
        0.0
    };

    let mut boosted = 0usize;
    for candidate in candidates.iter_mut() {
        if within_recency_window(candidate.created_at, now, params.recency_boost_days) {
            candidate.score *= 1.0 + factor;
            boosted = boosted.saturating_add(1);
        }
    }
    boosted
}
