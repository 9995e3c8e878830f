use std::collections::{BTreeMap, HashSet};

use common::{
    types::candidate::{CorpusSource, DedupMode, RetrievalCandidate},
    utils::config::DedupParams,
};
use tracing::debug;

use crate::scoring::compare_score_desc_total;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard similarity of lower-cased whitespace tokens. Two empty texts are
/// identical; one empty text shares nothing with a non-empty one.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);

    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

/// Collapses near-duplicate candidates.
///
/// Candidates are walked best-first; one whose text reaches `threshold`
/// similarity with an already kept candidate is dropped, and its citation
/// label (plus any labels it had absorbed) is appended to that keeper's
/// `alternate_sources`. Keepers are never replaced, so the higher-scored
/// member of a colliding pair always survives. `WithinCorpus` only compares
/// candidates that share a `source`.
///
/// Output is sorted by descending score and does not depend on input order.
pub fn deduplicate(
    candidates: Vec<RetrievalCandidate>,
    threshold: f64,
    mode: DedupMode,
) -> Vec<RetrievalCandidate> {
    if candidates.len() <= 1 {
        return candidates;
    }

    let input_len = candidates.len();
    let mut kept = match mode {
        DedupMode::CrossCorpus => collapse(candidates, threshold),
        DedupMode::WithinCorpus => {
            let mut partitions: BTreeMap<CorpusSource, Vec<RetrievalCandidate>> = BTreeMap::new();
            for candidate in candidates {
                partitions
                    .entry(candidate.source)
                    .or_default()
                    .push(candidate);
            }
            partitions
                .into_values()
                .flat_map(|partition| collapse(partition, threshold))
                .collect()
        }
    };

    kept.sort_by(compare_score_desc_total);

    debug!(
        input = input_len,
        kept = kept.len(),
        ?mode,
        threshold,
        "Deduplicated candidates"
    );
    kept
}

/// [`deduplicate`] with the loaded `dedup` settings.
pub fn deduplicate_with(
    candidates: Vec<RetrievalCandidate>,
    params: &DedupParams,
) -> Vec<RetrievalCandidate> {
    deduplicate(candidates, params.similarity_threshold, params.mode)
}

fn collapse(mut candidates: Vec<RetrievalCandidate>, threshold: f64) -> Vec<RetrievalCandidate> {
    candidates.sort_by(compare_score_desc_total);

    let mut kept: Vec<RetrievalCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate_of = kept
            .iter()
            .position(|keeper| jaccard_similarity(&keeper.text, &candidate.text) >= threshold);

        match duplicate_of.and_then(|index| kept.get_mut(index)) {
            Some(keeper) => {
                keeper.push_alternate_source(&candidate.source_label);
                for label in &candidate.alternate_sources {
                    keeper.push_alternate_source(label);
                }
            }
            None => kept.push(candidate),
        }
    }
    kept
}
