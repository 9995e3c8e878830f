use serde::{Deserialize, Serialize};

/// A resolved, displayable pointer to evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetAnchor {
    pub path: String,
    #[serde(default)]
    pub line: Option<u32>,
    /// `path` or `path:line`.
    pub anchor: String,
    #[serde(default)]
    pub snippet: Option<String>,
    /// Inherited from the originating finding; only used to prioritise trimming.
    pub distance: f64,
}

impl SnippetAnchor {
    pub fn path_only(path: impl Into<String>, distance: f64) -> Self {
        let path = path.into();
        Self {
            anchor: path.clone(),
            path,
            line: None,
            snippet: None,
            distance,
        }
    }

    pub fn at_line(path: impl Into<String>, line: u32, snippet: String, distance: f64) -> Self {
        let path = path.into();
        Self {
            anchor: format!("{path}:{line}"),
            path,
            line: Some(line),
            snippet: Some(snippet),
            distance,
        }
    }

    /// Characters this anchor costs in a rendered context block.
    pub fn size(&self) -> usize {
        let snippet_chars = self.snippet.as_deref().map_or(0, |s| s.chars().count());
        self.anchor.chars().count().saturating_add(snippet_chars)
    }
}
