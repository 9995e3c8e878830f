use chrono::{DateTime, Utc};
use common::{
    types::candidate::{DedupMode, RankedSourceList, RetrievalCandidate},
    utils::config::{FusionParams, KnowledgeConfig},
};
use tracing::{debug, instrument};

use crate::{dedup::deduplicate, scoring::reciprocal_rank_fusion};

/// Budget and tuning for unifying several corpora into one citation list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    pub fusion: FusionParams,
    pub similarity_threshold: f64,
    pub max_items: usize,
    /// Cap on the summed character count of kept candidate texts.
    pub max_chars: usize,
}

impl AssemblyOptions {
    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self {
            fusion: config.fusion,
            similarity_threshold: config.dedup.similarity_threshold,
            max_items: config.retrieval.top_k,
            max_chars: config.retrieval.max_context_chars,
        }
    }
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self::from_config(&KnowledgeConfig::default())
    }
}

/// Fuses code, review and wiki lists, collapses cross-corpus duplicates and
/// keeps the best-first prefix that fits the item and character budgets.
///
/// `options.fusion.top_k` is ignored; the budgets do the cutting.
#[instrument(skip_all, fields(lists = lists.len()))]
pub fn assemble_knowledge(
    lists: &[RankedSourceList],
    options: &AssemblyOptions,
    now: DateTime<Utc>,
) -> Vec<RetrievalCandidate> {
    let fusion = FusionParams {
        top_k: None,
        ..options.fusion
    };
    let fused = reciprocal_rank_fusion(lists, &fusion, now);
    let fused_len = fused.len();

    let unique = deduplicate(fused, options.similarity_threshold, DedupMode::CrossCorpus);
    let unique_len = unique.len();

    let mut used_chars = 0usize;
    let kept: Vec<RetrievalCandidate> = unique
        .into_iter()
        .take(options.max_items)
        .take_while(|candidate| {
            let next = used_chars.saturating_add(candidate.text.chars().count());
            if next > options.max_chars {
                return false;
            }
            used_chars = next;
            true
        })
        .collect();

    debug!(
        fused = fused_len,
        unique = unique_len,
        kept = kept.len(),
        chars = used_chars,
        "Assembled cross-corpus knowledge"
    );
    kept
}
