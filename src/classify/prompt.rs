//! Classification instruction template.
//!
//! Loaded from `config/prompts/classify.txt` when present; the same file is
//! compiled in as the fallback. `{{categories}}` is replaced with the
//! comma-separated allowed list.

use std::fs;
use std::path::Path;

const BUILTIN_TEMPLATE: &str = include_str!("../../config/prompts/classify.txt");
const CATEGORIES_VAR: &str = "{{categories}}";

/// Render the instruction for `categories`, reading the template at `path`.
pub fn build_instruction(path: &Path, categories: &[String]) -> String {
    let template = match fs::read_to_string(path) {
        Ok(text) if text.contains(CATEGORIES_VAR) => text,
        Ok(_) => {
            tracing::warn!(
                "prompt: '{}' has no {CATEGORIES_VAR} placeholder; using built-in template",
                path.display()
            );
            BUILTIN_TEMPLATE.to_string()
        }
        Err(_) => {
            tracing::debug!("prompt: '{}' not found; using built-in template", path.display());
            BUILTIN_TEMPLATE.to_string()
        }
    };
    render(&template, categories)
}

fn render(template: &str, categories: &[String]) -> String {
    template.trim().replace(CATEGORIES_VAR, &categories.join(","))
}
