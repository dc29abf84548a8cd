//! Classification-to-upload pipeline.
//!
//! - **prompt** — instruction template rendering.
//! - **parser** — category extraction from raw model text.
//! - **sequence** — per-category numbering and path-segment sanitization.
//! - **pipeline** — the folder walk driving model → parser → sequence → store.

pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod sequence;

use std::path::PathBuf;

use crate::config::Config;
use crate::error::AppError;

pub use parser::{ClassificationResult, parse_categories};
pub use pipeline::{ClassificationPipeline, RunSummary};
pub use sequence::{CategorySequenceTable, sanitize_category};

/// Validated inputs for one classification run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub image_folder: PathBuf,
    pub categories: Vec<String>,
    /// Positionally aligned with `categories`; shorter lists pad with 0.
    pub start_offsets: Vec<u64>,
    pub extensions: Vec<String>,
    pub prompt_file: PathBuf,
    pub repo: String,
    pub github_token: String,
    pub upload_dir: String,
}

impl RunConfig {
    /// Check everything a run needs before any file is touched.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let image_folder = config
            .classify
            .image_folder
            .clone()
            .ok_or_else(|| AppError::Config("classify.image_folder is required".into()))?;
        let repo = config
            .github
            .repo
            .clone()
            .ok_or_else(|| AppError::Config("github.repo is required".into()))?;
        let github_token = match (&config.github_token, repo.as_str()) {
            (Some(token), _) => token.clone(),
            (None, "dummy") => String::new(),
            (None, _) => return Err(AppError::Config("GITHUB_TOKEN is not set".into())),
        };
        if config.llm.provider == "gemini" && config.llm_api_key.is_none() {
            return Err(AppError::Config("LLM_API_KEY is not set".into()));
        }
        if config.classify.categories.is_empty() {
            return Err(AppError::Config("classify.categories must list at least one category".into()));
        }
        if config.classify.start_offsets.len() > config.classify.categories.len() {
            tracing::warn!(
                offsets = config.classify.start_offsets.len(),
                categories = config.classify.categories.len(),
                "more start offsets than categories; extras are ignored"
            );
        }

        Ok(Self {
            image_folder,
            categories: config.classify.categories.clone(),
            start_offsets: config.classify.start_offsets.clone(),
            extensions: config.classify.extensions.clone(),
            prompt_file: config.classify.prompt_file.clone(),
            repo,
            github_token,
            upload_dir: config.github.upload_dir.clone(),
        })
    }

    pub fn sequence_table(&self) -> CategorySequenceTable {
        CategorySequenceTable::seeded(&self.categories, &self.start_offsets)
    }
}
