//! GitHub contents API backend (`PUT /repos/{owner}/{repo}/contents/{path}`).
//!
//! Create-only: no SHA lookup is performed, so a write to an existing path
//! comes back as 422 and is surfaced as [`StoreError::AlreadyExists`].

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, error};

use super::{StoreError, UploadRecord};

const USER_AGENT: &str = concat!("image-cate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GitHubStore {
    client: Client,
    api_base_url: String,
    /// `owner/repo`.
    repo: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateFileRequest<'a> {
    message: &'a str,
    content: &'a str,
}

impl GitHubStore {
    pub fn new(api_base_url: String, repo: String, token: String, timeout_seconds: u64) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            repo: repo.trim_matches('/').to_string(),
            token,
        })
    }

    /// Contents endpoint for `path`, each segment percent-encoded.
    pub fn contents_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| StoreError::Request(format!("invalid api base url '{}': {e}", self.api_base_url)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Request(format!("api base url cannot be a base: {}", self.api_base_url)))?;
            segments.pop_if_empty().push("repos");
            segments.extend(self.repo.split('/'));
            segments.push("contents");
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    pub async fn create_file(&self, record: &UploadRecord) -> Result<(), StoreError> {
        let url = self.contents_url(&record.destination)?;
        let body = CreateFileRequest { message: &record.message, content: &record.content_base64 };

        debug!(url = %url, bytes_b64 = record.content_base64.len(), "creating file in repository");

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(repo = %self.repo, error = %e, "store HTTP request failed (transport)");
                StoreError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        if !is_failure(status) {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read error body>".to_string());
        Err(classify_failure(status, body, &record.destination))
    }
}

fn is_failure(status: u16) -> bool {
    status >= 400
}

/// Map a failed write to the store error taxonomy.
///
/// A 422 whose body mentions a `"sha"` field (bare, or escaped inside the
/// message string) means the path is already taken.
pub fn classify_failure(status: u16, body: String, path: &str) -> StoreError {
    if status == 422 && (body.contains(r#""sha""#) || body.contains(r#"\"sha\""#)) {
        return StoreError::AlreadyExists { path: path.to_string() };
    }
    StoreError::Status { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GitHubStore {
        GitHubStore::new("https://api.github.com/".into(), "owner/repo".into(), "t".into(), 5).unwrap()
    }

    #[test]
    fn contents_url_encodes_segments() {
        let url = store().contents_url("classified/风景/5.jpg").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/owner/repo/contents/classified/%E9%A3%8E%E6%99%AF/5.jpg"
        );
    }

    #[test]
    fn contents_url_respects_base_path() {
        let s = GitHubStore::new("https://ghe.example.com/api/v3".into(), "o/r".into(), "t".into(), 5).unwrap();
        assert_eq!(
            s.contents_url("a/0.png").unwrap().as_str(),
            "https://ghe.example.com/api/v3/repos/o/r/contents/a/0.png"
        );
    }

    #[test]
    fn existing_file_is_already_exists() {
        let body = r#"{"message":"Invalid request.\n\n\"sha\" wasn't supplied.","status":"422"}"#;
        match classify_failure(422, body.to_string(), "a/0.png") {
            StoreError::AlreadyExists { path } => assert_eq!(path, "a/0.png"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sha_field_is_already_exists() {
        let body = r#"{"message":"Invalid request.","errors":[{"field":"sha"}],"sha":null}"#;
        assert!(matches!(
            classify_failure(422, body.to_string(), "a"),
            StoreError::AlreadyExists { .. }
        ));
    }

    #[test]
    fn other_422_is_generic() {
        let body = r#"{"message":"path contains a malformed segment"}"#;
        assert!(matches!(
            classify_failure(422, body.to_string(), "a"),
            StoreError::Status { status: 422, .. }
        ));
    }

    #[test]
    fn server_error_keeps_status_and_body() {
        match classify_failure(502, "bad gateway".into(), "a") {
            StoreError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn success_codes_are_not_failures() {
        assert!(!is_failure(200));
        assert!(!is_failure(201));
        assert!(is_failure(401));
        assert!(is_failure(500));
    }
}
