//! Remote content store — one create-file write per (image, category) pair.
//!
//! `ContentStore` is an enum over backends, in the same shape as
//! [`VisionProvider`](crate::llm::VisionProvider). A write never overwrites:
//! an existing file at the destination path is reported as
//! [`StoreError::AlreadyExists`].

pub mod dummy;
pub mod github;

use thiserror::Error;

use crate::config::GitHubConfig;

pub const COMMIT_PREFIX: &str = "[image-cate]";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to build store request: {0}")]
    Request(String),
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("file already exists at {path}; updating existing files is not supported")]
    AlreadyExists { path: String },
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// One pending write, built per upload and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Local file name, used in the commit message.
    pub source_name: String,
    /// `upload_dir/sanitized_category/sequence.ext`, `/`-separated.
    pub destination: String,
    pub message: String,
    /// Standard base64 of the file bytes.
    pub content_base64: String,
}

impl UploadRecord {
    pub fn new(source_name: &str, category: &str, destination: String, bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            source_name: source_name.to_string(),
            destination,
            message: commit_message(source_name, category),
            content_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Human-readable commit message; always uses the unsanitized category.
pub fn commit_message(source_name: &str, category: &str) -> String {
    format!("{COMMIT_PREFIX} Classify and upload {source_name} to category {category}")
}

/// Join path segments with `/`, dropping empty segments and stray slashes.
pub fn join_remote_path(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// All available store backends.
#[derive(Debug, Clone)]
pub enum ContentStore {
    Dummy(dummy::DummyStore),
    GitHub(github::GitHubStore),
}

impl ContentStore {
    /// Create the file described by `record`. Exactly one write attempt.
    pub async fn create_file(&self, record: &UploadRecord) -> Result<(), StoreError> {
        match self {
            ContentStore::Dummy(s) => s.create_file(record).await,
            ContentStore::GitHub(s) => s.create_file(record).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContentStore::Dummy(_) => "dummy",
            ContentStore::GitHub(_) => "github",
        }
    }
}

/// Construct the store from config. `repo = "dummy"` selects the in-memory store.
pub fn build(config: &GitHubConfig, repo: &str, token: &str) -> Result<ContentStore, StoreError> {
    if repo == "dummy" {
        return Ok(ContentStore::Dummy(dummy::DummyStore::new()));
    }
    let store = github::GitHubStore::new(
        config.api_base_url.clone(),
        repo.to_string(),
        token.to_string(),
        config.timeout_seconds,
    )?;
    Ok(ContentStore::GitHub(store))
}
