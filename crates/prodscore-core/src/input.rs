use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accepted column names per field, current scheme first
pub mod columns {
    pub const ORIGINAL_TITLE: &[&str] = &["Title_Original", "original_title"];
    pub const ORIGINAL_DESCRIPTION: &[&str] = &["Description_original", "original_description"];
    pub const OPTIMIZED_TITLE: &[&str] = &["Title_AI_optimized", "optimized_title"];
    pub const OPTIMIZED_DESCRIPTION: &[&str] = &["Description_optimized_AI", "optimized_description"];
    pub const LANG: &[&str] = &["lang"];
    pub const ROW_ID: &[&str] = &["id", "sku", "offer_id"];

    pub const AUDIT_ID: &[&str] = &["id", "offer_id", "supplier_id"];
    pub const AUDIT_URL: &[&str] = &["url"];
    pub const AUDIT_TITLE: &[&str] = &["title"];
    pub const AUDIT_DESCRIPTION: &[&str] = &["description"];
    pub const AUDIT_CATEGORY: &[&str] = &["cate_info_ai", "category_name"];
    pub const AUDIT_KEYWORDS: &[&str] = &["keyword_ai", "keywords"];
}

/// First non-empty value among the candidate column names
pub fn lookup<'a>(fields: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .map(|v| v.as_str())
        .find(|v| !v.trim().is_empty())
}

/// Optimized title cell: one title or a JSON array of alternatives.
///
/// Resolved once when the row is read; downstream code only sees
/// [`TitleCandidates::as_slice`], which is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "titles", rename_all = "lowercase")]
pub enum TitleCandidates {
    Single(String),
    Multiple(Vec<String>),
}

impl TitleCandidates {
    /// Parse a cell. A JSON array of strings yields `Multiple`; anything else,
    /// including text that merely starts with `[`, is a single title.
    /// Returns `None` when no non-empty title remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with('[') {
            if let Ok(items) = serde_json::from_str::<Vec<String>>(raw) {
                let titles: Vec<String> = items
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                return if titles.is_empty() {
                    None
                } else {
                    Some(TitleCandidates::Multiple(titles))
                };
            }
        }
        Some(TitleCandidates::Single(raw.to_string()))
    }

    pub fn as_slice(&self) -> &[String] {
        match self {
            TitleCandidates::Single(title) => std::slice::from_ref(title),
            TitleCandidates::Multiple(titles) => titles,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// One evaluation input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRow {
    pub row_id: String,
    pub original_title: String,
    pub original_description: String,
    pub optimized_titles: Option<TitleCandidates>,
    pub optimized_description: String,
    /// Explicit language tag, trimmed; `None` when absent or blank
    pub lang: Option<String>,
}

impl InputRow {
    /// Build a row from named fields, accepting either column scheme
    pub fn from_fields(row_index: usize, fields: &HashMap<String, String>) -> Self {
        let get = |names: &[&str]| lookup(fields, names).unwrap_or_default().to_string();
        Self {
            row_id: lookup(fields, columns::ROW_ID)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| (row_index + 1).to_string()),
            original_title: get(columns::ORIGINAL_TITLE),
            original_description: get(columns::ORIGINAL_DESCRIPTION),
            optimized_titles: lookup(fields, columns::OPTIMIZED_TITLE).and_then(TitleCandidates::parse),
            optimized_description: get(columns::OPTIMIZED_DESCRIPTION),
            lang: lookup(fields, columns::LANG).map(|s| s.trim().to_string()),
        }
    }

    /// Required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.original_title.trim().is_empty() {
            missing.push("original_title");
        }
        if self.optimized_titles.is_none() {
            missing.push("optimized_title");
        }
        if self.optimized_description.trim().is_empty() {
            missing.push("optimized_description");
        }
        missing
    }

    pub fn candidates(&self) -> &[String] {
        self.optimized_titles
            .as_ref()
            .map(TitleCandidates::as_slice)
            .unwrap_or_default()
    }
}
