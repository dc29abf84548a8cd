//! Category → URL-list manifest: fetch, validate, hold in memory.
//!
//! The top-level value must be a JSON object. Each category is validated on
//! its own: an array of strings is kept, anything else is dropped with a
//! warning while its siblings still load.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest fetch failed: {0}")]
    Fetch(String),
    #[error("manifest server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest top-level value must be an object, got {0}")]
    Shape(&'static str),
    #[error("cannot read manifest file: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable category → ordered URL list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageManifest {
    categories: BTreeMap<String, Vec<String>>,
}

impl ImageManifest {
    /// Validate a decoded JSON document.
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        let Value::Object(map) = value else {
            return Err(ManifestError::Shape(kind(&value)));
        };

        let mut categories = BTreeMap::new();
        for (name, entry) in map {
            match string_list(entry) {
                Some(urls) => {
                    categories.insert(name, urls);
                }
                None => warn!(category = %name, "dropping manifest entry: expected an array of strings"),
            }
        }
        Ok(Self { categories })
    }

    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Known category names, sorted.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn string_list(value: Value) -> Option<Vec<String>> {
    let Value::Array(items) = value else {
        return None;
    };
    items
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where the manifest comes from.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    /// http(s) URL, or a local file path.
    pub location: String,
    /// Sent as a bearer token on http(s) fetches.
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl ManifestSource {
    fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    /// Fetch and validate the manifest.
    pub async fn load(&self) -> Result<ImageManifest, ManifestError> {
        let text = if self.is_remote() {
            self.fetch().await?
        } else {
            tokio::fs::read_to_string(&self.location).await?
        };
        let manifest = ImageManifest::from_json(&text)?;
        info!(location = %self.location, categories = manifest.len(), "manifest loaded");
        Ok(manifest)
    }

    async fn fetch(&self) -> Result<String, ManifestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()
            .map_err(|e| ManifestError::Fetch(format!("failed to build HTTP client: {e}")))?;

        let mut req = client.get(&self.location);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| ManifestError::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ManifestError::Status { status: status.as_u16(), body });
        }
        resp.text().await.map_err(|e| ManifestError::Fetch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_malformed_categories() {
        let m = ImageManifest::from_value(json!({"a": ["x", "y"], "b": "not-an-array", "c": [1, 2]})).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("a").unwrap(), ["x".to_string(), "y".to_string()]);
        assert!(m.get("b").is_none());
        assert!(m.get("c").is_none());
    }

    #[test]
    fn mixed_array_is_dropped() {
        let m = ImageManifest::from_value(json!({"a": ["x", null], "b": ["z"]})).unwrap();
        assert_eq!(m.category_names(), vec!["b"]);
    }

    #[test]
    fn empty_array_is_kept() {
        let m = ImageManifest::from_value(json!({"empty": []})).unwrap();
        assert_eq!(m.get("empty").unwrap().len(), 0);
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(ImageManifest::from_value(json!(["a"])), Err(ManifestError::Shape("array"))));
        assert!(matches!(ImageManifest::from_value(json!(3)), Err(ManifestError::Shape("number"))));
    }

    #[test]
    fn bad_json_is_parse_error() {
        assert!(matches!(ImageManifest::from_json("{nope"), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn url_order_is_preserved() {
        let m = ImageManifest::from_json(r#"{"cat": ["3", "1", "2"]}"#).unwrap();
        assert_eq!(m.get("cat").unwrap(), ["3", "1", "2"].map(String::from));
    }

    #[tokio::test]
    async fn loads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{"风景": ["https://x/1.jpg"]}"#).unwrap();
        let source = ManifestSource {
            location: path.to_string_lossy().into_owned(),
            token: None,
            timeout_seconds: 1,
        };
        let m = source.load().await.unwrap();
        assert_eq!(m.category_names(), vec!["风景"]);
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let source = ManifestSource { location: "/nonexistent/m.json".into(), token: None, timeout_seconds: 1 };
        assert!(matches!(source.load().await, Err(ManifestError::Io(_))));
    }
}
