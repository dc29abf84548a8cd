//! Per-category sequence numbers and path-segment sanitization.
//!
//! The table lives as long as one pipeline run and is never persisted.
//! Keys are the raw category names; only the path segment is sanitized.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CategorySequenceTable {
    next: HashMap<String, u64>,
}

impl CategorySequenceTable {
    /// Seed from positionally aligned categories and offsets. A category
    /// without an offset starts at 0.
    pub fn seeded(categories: &[String], offsets: &[u64]) -> Self {
        let next = categories
            .iter()
            .enumerate()
            .map(|(i, cat)| (cat.clone(), offsets.get(i).copied().unwrap_or(0)))
            .collect();
        Self { next }
    }

    /// Number the next upload for `category` will use. Unknown categories start at 0.
    pub fn peek(&self, category: &str) -> u64 {
        self.next.get(category).copied().unwrap_or(0)
    }

    /// Consume the current number. Call only after the upload succeeded.
    /// Saturates at `u64::MAX`; the next write to that name then collides
    /// and is rejected by the store as already existing.
    pub fn advance(&mut self, category: &str) {
        let n = self.next.entry(category.to_string()).or_insert(0);
        *n = n.saturating_add(1);
    }

    /// File name for the next upload: the sequence number plus `extension`
    /// (including its leading dot, or empty).
    pub fn file_name(&self, category: &str, extension: &str) -> String {
        format!("{}{}", self.peek(category), extension)
    }
}

/// Make a category name safe as a single path segment.
///
/// Anything other than ASCII letters, digits, space and CJK ideographs
/// U+4E00..=U+9FA5 becomes `_`; spaces become `_`; leading and trailing
/// underscores are trimmed.
pub fn sanitize_category(category: &str) -> String {
    let mapped: String = category
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' || ('\u{4e00}'..='\u{9fa5}').contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    mapped.replace(' ', "_").trim_matches('_').to_string()
}
