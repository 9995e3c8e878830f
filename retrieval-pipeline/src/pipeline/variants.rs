use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantType {
    Intent,
    FilePath,
    CodeShape,
}

impl VariantType {
    /// Positional assignment: intent, file-path, code-shape, then intent for
    /// every further query.
    pub fn for_position(index: usize) -> Self {
        match index {
            1 => VariantType::FilePath,
            2 => VariantType::CodeShape,
            _ => VariantType::Intent,
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VariantType::Intent => "intent",
            VariantType::FilePath => "file-path",
            VariantType::CodeShape => "code-shape",
        };
        f.write_str(label)
    }
}

/// One reformulation of the information need, searched independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalVariant {
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub query: String,
    /// Collaborator-side tie-break only; the pipeline does not read it.
    pub priority: usize,
}

pub fn build_variants(queries: &[String]) -> Vec<RetrievalVariant> {
    queries
        .iter()
        .enumerate()
        .map(|(index, query)| RetrievalVariant {
            variant_type: VariantType::for_position(index),
            query: query.clone(),
            priority: index.min(2),
        })
        .collect()
}

/// Candidates each variant asks for so the pooled total covers `top_k`.
pub fn per_variant_top_k(top_k: usize, variant_count: usize) -> usize {
    top_k.div_ceil(variant_count.max(1))
}
