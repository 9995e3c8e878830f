use std::{cmp::Ordering, path::Path};

use common::{
    types::finding::{RerankedHit, RetrievalHit},
    utils::config::LanguageBoost,
};
use tracing::debug;

/// Symmetric affinity pairs of canonical language names.
const RELATED_LANGUAGES: &[(&str, &str)] = &[
    ("c", "cpp"),
    ("c", "objective-c"),
    ("cpp", "objective-c"),
    ("typescript", "javascript"),
    ("java", "kotlin"),
    ("java", "scala"),
    ("kotlin", "scala"),
];

/// Canonical, lower-case language name for a user- or store-supplied label.
pub fn normalize_language(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let canonical = match lowered.as_str() {
        "c++" | "cxx" | "cc" => "cpp",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "node" => "javascript",
        "py" | "python3" => "python",
        "golang" => "go",
        "rb" => "ruby",
        "c#" | "cs" => "csharp",
        "objc" | "objectivec" | "obj-c" => "objective-c",
        "kt" => "kotlin",
        "rs" => "rust",
        "sh" | "bash" | "zsh" => "shell",
        other => other,
    };
    Some(canonical.to_owned())
}

/// Infers a language from a file extension.
pub fn language_from_path(path: &str) -> Option<&'static str> {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();

    let language = match extension.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "m" | "mm" => "objective-c",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        _ => return None,
    };
    Some(language)
}

/// Stored language when present, otherwise inferred from the file path, so
/// records written before languages were stored still rerank.
pub fn resolve_language(hit: &RetrievalHit) -> Option<String> {
    hit.record
        .language
        .as_deref()
        .and_then(normalize_language)
        .or_else(|| language_from_path(&hit.record.file_path).map(str::to_owned))
}

pub fn are_related(a: &str, b: &str) -> bool {
    RELATED_LANGUAGES
        .iter()
        .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Affinity {
    multiplier: f64,
    exact: bool,
}

fn affinity(language: Option<&str>, pr_languages: &[String], boost: &LanguageBoost) -> Affinity {
    let neutral = Affinity {
        multiplier: 1.0,
        exact: false,
    };
    let Some(language) = language else {
        return neutral;
    };

    if pr_languages.iter().any(|pr| pr == language) {
        return Affinity {
            multiplier: boost.same_language_boost.min(1.0),
            exact: true,
        };
    }
    if pr_languages.iter().any(|pr| are_related(pr, language)) {
        return Affinity {
            multiplier: boost.related_multiplier().min(1.0),
            exact: false,
        };
    }
    neutral
}

/// Scales each hit's distance by its language affinity with the pull
/// request and sorts ascending by the adjusted distance.
///
/// An exact match uses `same_language_boost`; a related language gets the
/// fraction `related_language_ratio` of that boost; anything else, including
/// unknown languages, keeps its distance. No distance ever grows.
pub fn rerank_by_language(
    hits: Vec<RetrievalHit>,
    pr_languages: &[String],
    boost: &LanguageBoost,
) -> Vec<RerankedHit> {
    let pr_languages: Vec<String> = pr_languages
        .iter()
        .filter_map(|language| normalize_language(language))
        .collect();

    let mut matched = 0usize;
    let mut reranked: Vec<RerankedHit> = hits
        .into_iter()
        .map(|hit| {
            let language = resolve_language(&hit);
            let affinity = affinity(language.as_deref(), &pr_languages, boost);
            if affinity.exact {
                matched = matched.saturating_add(1);
            }
            RerankedHit {
                adjusted_distance: hit.distance * affinity.multiplier,
                language_match: affinity.exact,
                hit,
            }
        })
        .collect();

    reranked.sort_by(|a, b| {
        a.adjusted_distance
            .partial_cmp(&b.adjusted_distance)
            .unwrap_or(Ordering::Equal)
    });

    debug!(
        results = reranked.len(),
        language_matches = matched,
        pr_languages = ?pr_languages,
        "Applied language affinity rerank"
    );
    reranked
}
