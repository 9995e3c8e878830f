use std::{
    cmp::Ordering,
    collections::HashSet,
    path::{Component, Path, PathBuf},
};

use common::{error::AppError, types::anchor::SnippetAnchor};
use tracing::debug;

const MAX_SNIPPET_CHARS: usize = 160;
const MAX_ANCHOR_TOKENS: usize = 3;
const MIN_TOKEN_CHARS: usize = 4;

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "will", "should", "could", "would", "when", "then",
    "than", "there", "their", "which", "where", "while", "into", "only", "also", "does", "been",
    "being", "were", "more", "most", "some", "such", "very", "avoid", "consider", "instead",
    "using", "because", "missing", "other", "about", "after", "before", "make", "sure",
];

/// Reads workspace files for snippet extraction.
pub trait FileReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileReader;

impl FileReader for FsFileReader {
    fn read(&self, path: &Path) -> Result<String, AppError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// A finding to anchor: where it points and what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorFinding {
    pub path: String,
    /// 1-based line hint, if the finding recorded one.
    pub line: Option<u32>,
    pub text: String,
    pub distance: f64,
}

/// Resolves each finding to a `path[:line]` anchor with a one-line excerpt.
///
/// Never fails: unreadable files, paths escaping the workspace and findings
/// whose tokens do not occur in the file all degrade to a path-only anchor.
pub fn build_snippet_anchors(
    workspace_root: &Path,
    findings: &[AnchorFinding],
    reader: &dyn FileReader,
) -> Vec<SnippetAnchor> {
    let anchors: Vec<SnippetAnchor> = findings
        .iter()
        .map(|finding| anchor_finding(workspace_root, finding, reader))
        .collect();

    debug!(
        findings = findings.len(),
        with_line = anchors.iter().filter(|a| a.line.is_some()).count(),
        "Built snippet anchors"
    );
    anchors
}

fn anchor_finding(
    workspace_root: &Path,
    finding: &AnchorFinding,
    reader: &dyn FileReader,
) -> SnippetAnchor {
    let fallback = || SnippetAnchor::path_only(finding.path.clone(), finding.distance);

    let Some(full_path) = resolve_in_workspace(workspace_root, &finding.path) else {
        debug!(path = %finding.path, "Finding path escapes workspace; anchoring to path only");
        return fallback();
    };

    let content = match reader.read(&full_path) {
        Ok(content) => content,
        Err(err) => {
            debug!(path = %finding.path, error = %err, "Could not read file for snippet");
            return fallback();
        }
    };

    let tokens = distinguishing_tokens(&finding.text);
    let Some((line_number, line)) = locate_line(&content, &tokens, finding.line) else {
        return fallback();
    };

    match u32::try_from(line_number) {
        Ok(line_number) => SnippetAnchor::at_line(
            finding.path.clone(),
            line_number,
            clean_snippet(line),
            finding.distance,
        ),
        Err(_) => fallback(),
    }
}

fn resolve_in_workspace(workspace_root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let escapes = relative.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || relative.as_os_str().is_empty() {
        return None;
    }
    Some(workspace_root.join(relative))
}

/// Longest identifier-like tokens first: they are the least likely to match
/// unrelated lines.
pub fn distinguishing_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens: Vec<String> = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_ascii_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .filter(|token| seen.insert(token.clone()))
        .collect();

    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    tokens.truncate(MAX_ANCHOR_TOKENS);
    tokens
}

/// Returns the 1-based line number and raw text of the anchoring line.
fn locate_line<'a>(
    content: &'a str,
    tokens: &[String],
    hint: Option<u32>,
) -> Option<(usize, &'a str)> {
    if tokens.is_empty() {
        return None;
    }

    let lines: Vec<&str> = content.lines().collect();
    let lowered: Vec<String> = lines.iter().map(|line| line.to_ascii_lowercase()).collect();
    let matches = |index: usize, token: &str| {
        lowered
            .get(index)
            .is_some_and(|line| line.contains(token))
    };

    if let Some(hint) = hint.and_then(|h| usize::try_from(h).ok()) {
        if let Some(index) = hint.checked_sub(1) {
            if tokens.iter().any(|token| matches(index, token)) {
                return lines.get(index).map(|line| (hint, *line));
            }
        }
    }

    tokens.iter().find_map(|token| {
        let index = (0..lowered.len()).find(|&index| matches(index, token))?;
        lines
            .get(index)
            .map(|line| (index.saturating_add(1), *line))
    })
}

fn clean_snippet(line: &str) -> String {
    let cleaned: String = line
        .chars()
        .filter(|c| !matches!(c, '`' | '\r' | '\n'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= MAX_SNIPPET_CHARS {
        return cleaned.to_owned();
    }
    let mut truncated: String = cleaned.chars().take(MAX_SNIPPET_CHARS).collect();
    truncated.push_str("...");
    truncated
}

fn compare_anchors(a: &SnippetAnchor, b: &SnippetAnchor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.size().cmp(&b.size()))
        .then_with(|| a.anchor.cmp(&b.anchor))
        .then_with(|| a.snippet.cmp(&b.snippet))
}

/// Keeps the most relevant anchors that fit both caps.
///
/// Anchors are ordered by ascending distance (then size and text, so input
/// order never matters), cut to `max_items`, and then dropped from the
/// highest-distance end until their combined size fits `max_chars`.
pub fn trim_snippet_anchors(
    mut anchors: Vec<SnippetAnchor>,
    max_items: usize,
    max_chars: usize,
) -> Vec<SnippetAnchor> {
    let input_len = anchors.len();
    anchors.sort_by(compare_anchors);
    anchors.truncate(max_items);

    let mut total = anchors
        .iter()
        .fold(0usize, |sum, anchor| sum.saturating_add(anchor.size()));
    while total > max_chars {
        let Some(dropped) = anchors.pop() else {
            break;
        };
        total = total.saturating_sub(dropped.size());
    }

    debug!(
        input = input_len,
        kept = anchors.len(),
        chars = total,
        max_items,
        max_chars,
        "Trimmed snippet anchors"
    );
    anchors
}
