//! Category extraction from free-form model output.
//!
//! The model is told to answer with exactly one `{"cate": [...]}` object,
//! but replies often arrive wrapped in prose or code fences. Every
//! non-overlapping match of the object shape is decoded in order; the last
//! one that decodes wins. No match yields an empty list.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

static CATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"cate"\s*:\s*\[\s*"[^"]+"\s*(?:,\s*"[^"]+"\s*)*\]\s*\}"#)
        .expect("category pattern is a valid regex")
});

#[derive(Debug, Deserialize)]
struct CateInfo {
    cate: Vec<String>,
}

/// Categories reported for one image, in model order. May be empty and may
/// contain names outside the configured list.
pub type ClassificationResult = Vec<String>;

/// Extract the category list from raw model text.
pub fn parse_categories(text: &str) -> ClassificationResult {
    let mut result = Vec::new();
    for m in CATE_PATTERN.find_iter(text) {
        match serde_json::from_str::<CateInfo>(m.as_str()) {
            Ok(info) => result = info.cate,
            Err(e) => warn!(matched = m.as_str(), error = %e, "skipping undecodable category object"),
        }
    }
    result
}
