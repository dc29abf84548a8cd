//! Sequential folder walk: model → parser → sequence table → store.
//!
//! One file at a time, one category at a time. Per-file and per-category
//! failures are logged and counted; only an unreadable source folder stops
//! the run.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::parser::parse_categories;
use super::sequence::{CategorySequenceTable, sanitize_category};
use super::{RunConfig, prompt};
use crate::error::AppError;
use crate::llm::VisionProvider;
use crate::store::{ContentStore, StoreError, UploadRecord, join_remote_path};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Regular files found in the folder.
    pub files_seen: usize,
    /// Files skipped for their extension.
    pub not_images: usize,
    /// Files that could not be read or classified.
    pub failed: usize,
    /// Files the model gave no category for.
    pub unclassified: usize,
    pub uploaded: usize,
    pub upload_failures: usize,
    pub total_tokens: u64,
}

/// Result of handing one category of one image to the store.
#[derive(Debug)]
pub struct CategoryUpload {
    pub category: String,
    pub destination: String,
    pub result: Result<(), StoreError>,
}

pub struct ClassificationPipeline {
    provider: VisionProvider,
    store: ContentStore,
    instruction: String,
    upload_dir: String,
    extensions: Vec<String>,
    sequences: CategorySequenceTable,
}

impl ClassificationPipeline {
    pub fn new(run: &RunConfig, provider: VisionProvider, store: ContentStore) -> Self {
        Self {
            provider,
            store,
            instruction: prompt::build_instruction(&run.prompt_file, &run.categories),
            upload_dir: run.upload_dir.clone(),
            extensions: run.extensions.clone(),
            sequences: run.sequence_table(),
        }
    }

    pub fn sequences(&self) -> &CategorySequenceTable {
        &self.sequences
    }

    /// Process every image directly inside `folder`, in file-name order.
    pub async fn run(&mut self, folder: &Path) -> Result<RunSummary, AppError> {
        let files = list_files(folder)
            .await
            .map_err(|e| AppError::Config(format!("cannot read folder {}: {e}", folder.display())))?;

        let mut summary = RunSummary::default();
        if files.is_empty() {
            info!(folder = %folder.display(), "no files found; nothing to do");
            return Ok(summary);
        }

        for path in files {
            summary.files_seen += 1;
            self.process_file(&path, &mut summary).await;
        }

        info!(
            files = summary.files_seen,
            uploaded = summary.uploaded,
            upload_failures = summary.upload_failures,
            total_tokens = summary.total_tokens,
            "all files processed"
        );
        Ok(summary)
    }

    async fn process_file(&mut self, path: &Path, summary: &mut RunSummary) {
        let name = file_name(path);
        if !is_image(path, &self.extensions) {
            debug!(file = %name, "skipping: not an image file");
            summary.not_images += 1;
            return;
        }

        info!(file = %name, "processing image");

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot read file");
                summary.failed += 1;
                return;
            }
        };

        let response = match self.provider.describe_image(&bytes, &self.instruction).await {
            Ok(r) => r,
            Err(e) => {
                warn!(file = %name, error = %e, "classification failed");
                summary.failed += 1;
                return;
            }
        };
        summary.total_tokens += response.total_tokens();

        let categories = parse_categories(&response.text);
        info!(file = %name, ?categories, tokens = response.total_tokens(), "model categories");

        if categories.is_empty() {
            info!(file = %name, "no category returned; skipping upload");
            summary.unclassified += 1;
            return;
        }

        for outcome in self.upload_categories(path, &bytes, &categories).await {
            match outcome.result {
                Ok(()) => summary.uploaded += 1,
                Err(_) => summary.upload_failures += 1,
            }
        }
    }

    /// Upload `bytes` once per category. The sequence number for a category
    /// advances only when its write succeeds.
    pub async fn upload_categories(
        &mut self,
        path: &Path,
        bytes: &[u8],
        categories: &[String],
    ) -> Vec<CategoryUpload> {
        let name = file_name(path);
        let extension = extension_with_dot(path);
        let mut outcomes = Vec::with_capacity(categories.len());

        for category in categories {
            let segment = sanitize_category(category);
            let file = self.sequences.file_name(category, &extension);
            let destination = join_remote_path(&[self.upload_dir.as_str(), segment.as_str(), file.as_str()]);
            let record = UploadRecord::new(&name, category, destination.clone(), bytes);

            info!(%category, %destination, "uploading");
            let result = self.store.create_file(&record).await;
            match &result {
                Ok(()) => {
                    self.sequences.advance(category);
                    info!(%destination, "upload succeeded");
                }
                Err(e) => error!(file = %name, %category, error = %e, "upload failed"),
            }
            outcomes.push(CategoryUpload { category: category.clone(), destination, result });
        }
        outcomes
    }
}

/// Non-directory entries of `folder`, sorted by file name. No recursion.
async fn list_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(folder).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => continue,
            Ok(_) => files.push(path),
            Err(e) => warn!(path = %path.display(), error = %e, "cannot stat entry; skipped"),
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension_with_dot(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Case-insensitive extension check against the configured list.
pub fn is_image(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|allowed| *allowed == ext))
}
