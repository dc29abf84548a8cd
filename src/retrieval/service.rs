//! Retrieval service — `get_image_link` over the in-memory manifest.
//!
//! The manifest snapshot is replaced wholesale on (re)load and read-only in
//! between, so request handling only clones an `Arc`.

use std::sync::{Arc, RwLock};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::manifest::{ImageManifest, ManifestSource};
use super::sampler::sample;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("image store is not initialized")]
    Uninitialized,
    #[error("unknown category '{category}'; known categories: {}", .known.join(", "))]
    UnknownCategory { category: String, known: Vec<String> },
}

/// Arguments of one `get_image_link` call.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalRequest {
    pub category: String,
    /// Defaults to 1; values below 1 are raised to 1.
    #[serde(default)]
    pub num: Option<i64>,
}

impl RetrievalRequest {
    pub fn count(&self) -> usize {
        self.num.unwrap_or(1).max(1) as usize
    }
}

pub struct RetrievalService {
    source: Option<ManifestSource>,
    /// `None` until a load leaves at least one category.
    manifest: RwLock<Option<Arc<ImageManifest>>>,
}

impl RetrievalService {
    /// A service with no source; every request reports `Uninitialized`.
    pub fn uninitialized() -> Self {
        Self { source: None, manifest: RwLock::new(None) }
    }

    /// Wrap an already validated manifest.
    pub fn from_manifest(manifest: ImageManifest) -> Self {
        let service = Self { source: None, manifest: RwLock::new(None) };
        service.install(manifest);
        service
    }

    /// Load from `source`. A failed load leaves the service uninitialized
    /// rather than failing construction.
    pub async fn connect(source: ManifestSource) -> Self {
        let service = Self { source: Some(source), manifest: RwLock::new(None) };
        service.reload().await;
        service
    }

    /// Re-run the load and swap the snapshot. Returns whether the service is
    /// initialized afterwards.
    pub async fn reload(&self) -> bool {
        let Some(source) = &self.source else {
            warn!("no manifest source configured; image store stays uninitialized");
            return false;
        };
        match source.load().await {
            Ok(manifest) => self.install(manifest),
            Err(e) => {
                error!(location = %source.location, error = %e, "manifest load failed");
                self.set(None);
                false
            }
        }
    }

    fn install(&self, manifest: ImageManifest) -> bool {
        if manifest.is_empty() {
            warn!("manifest has no valid categories; image store stays uninitialized");
            self.set(None);
            return false;
        }
        info!(categories = manifest.len(), "image store initialized");
        self.set(Some(Arc::new(manifest)));
        true
    }

    fn set(&self, manifest: Option<Arc<ImageManifest>>) {
        match self.manifest.write() {
            Ok(mut guard) => *guard = manifest,
            Err(poisoned) => *poisoned.into_inner() = manifest,
        }
    }

    fn snapshot(&self) -> Option<Arc<ImageManifest>> {
        match self.manifest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn category_names(&self) -> Vec<String> {
        self.snapshot().map(|m| m.category_names()).unwrap_or_default()
    }

    /// Sample URLs for the requested category.
    pub fn get_image_link(&self, request: &RetrievalRequest) -> Result<Vec<String>, RetrievalError> {
        let manifest = self.snapshot().ok_or(RetrievalError::Uninitialized)?;
        let urls = manifest.get(&request.category).ok_or_else(|| RetrievalError::UnknownCategory {
            category: request.category.clone(),
            known: manifest.category_names(),
        })?;
        Ok(sample(urls, request.count(), &mut rand::thread_rng()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> RetrievalService {
        RetrievalService::from_manifest(
            ImageManifest::from_json(r#"{"风景": ["u1", "u2", "u3"], "美食": ["f1"]}"#).unwrap(),
        )
    }

    fn req(category: &str, num: Option<i64>) -> RetrievalRequest {
        RetrievalRequest { category: category.into(), num }
    }

    #[test]
    fn count_defaults_and_floors() {
        assert_eq!(req("a", None).count(), 1);
        assert_eq!(req("a", Some(0)).count(), 1);
        assert_eq!(req("a", Some(-4)).count(), 1);
        assert_eq!(req("a", Some(3)).count(), 3);
    }

    #[test]
    fn returns_requested_number() {
        let s = service();
        assert_eq!(s.get_image_link(&req("风景", Some(2))).unwrap().len(), 2);
        assert_eq!(s.get_image_link(&req("风景", None)).unwrap().len(), 1);
        let mut all = s.get_image_link(&req("风景", Some(10))).unwrap();
        all.sort();
        assert_eq!(all, vec!["u1\n", "u2\n", "u3\n"]);
    }

    #[test]
    fn unknown_category_lists_known() {
        let err = service().get_image_link(&req("cats", None)).unwrap_err();
        assert_eq!(
            err,
            RetrievalError::UnknownCategory { category: "cats".into(), known: vec!["美食".into(), "风景".into()] }
        );
        assert!(err.to_string().contains("美食, 风景"));
    }

    #[test]
    fn uninitialized_rejects_requests() {
        let s = RetrievalService::uninitialized();
        assert!(!s.is_initialized());
        assert_eq!(s.get_image_link(&req("风景", None)), Err(RetrievalError::Uninitialized));
    }

    #[test]
    fn manifest_without_valid_categories_stays_uninitialized() {
        let s = RetrievalService::from_manifest(ImageManifest::from_json(r#"{"a": 1}"#).unwrap());
        assert!(!s.is_initialized());
    }

    #[tokio::test]
    async fn failed_load_stays_uninitialized() {
        let s = RetrievalService::connect(ManifestSource {
            location: "/nonexistent/manifest.json".into(),
            token: None,
            timeout_seconds: 1,
        })
        .await;
        assert!(!s.is_initialized());
        assert_eq!(s.get_image_link(&req("x", None)), Err(RetrievalError::Uninitialized));
    }

    #[tokio::test]
    async fn reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, r#"{"a": ["1"]}"#).unwrap();
        let s = RetrievalService::connect(ManifestSource {
            location: path.to_string_lossy().into_owned(),
            token: None,
            timeout_seconds: 1,
        })
        .await;
        assert_eq!(s.category_names(), vec!["a"]);

        std::fs::write(&path, r#"{"a": ["1"], "b": ["2"]}"#).unwrap();
        assert!(s.reload().await);
        assert_eq!(s.category_names(), vec!["a", "b"]);

        std::fs::write(&path, "[]").unwrap();
        assert!(!s.reload().await);
        assert!(!s.is_initialized());
    }
}
