//! Gemini `generateContent` provider.
//!
//! Sends one user turn made of an inline base64 image part and a text part.
//! All Gemini wire types are private to this module.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::image::mime_type;
use crate::llm::{LlmResponse, LlmUsage, ProviderError, http_client};

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for the Gemini REST API (or a gateway exposing the same shape).
///
/// Cheap to clone: `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base_url: String,
    /// Gateways in front of Gemini expect the key as a bearer token too.
    bearer_auth: bool,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(
        api_base_url: String,
        bearer_auth: bool,
        model: String,
        timeout_seconds: u64,
        proxy_url: Option<&str>,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let client = http_client(timeout_seconds, proxy_url)?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bearer_auth,
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base_url, self.model)
    }

    pub async fn describe_image(&self, image: &[u8], instruction: &str) -> Result<LlmResponse, ProviderError> {
        let payload = build_request(image, instruction);

        debug!(
            model = %self.model,
            image_bytes = image.len(),
            prompt_len = instruction.len(),
            "sending gemini request"
        );

        let mut req = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload);
        if self.bearer_auth {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "gemini HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            error!(%status, "gemini request returned HTTP error");
            return Err(ProviderError::Request(format!("HTTP {status}: {body}")));
        }
        trace!(response = %body, "full gemini response payload");

        parse_response(&body)
    }
}

/// Decode a `generateContent` response body into text + usage.
fn parse_response(body: &str) -> Result<LlmResponse, ProviderError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Request(format!("failed to parse response body: {e}")))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let usage = parsed.usage_metadata.map(|u| LlmUsage {
        input_tokens: u.prompt_token_count,
        output_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    });

    Ok(LlmResponse { text, usage })
}

fn build_request(image: &[u8], instruction: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![
                RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type(image),
                        data: STANDARD.encode(image),
                    },
                },
                RequestPart::Text { text: instruction.to_string() },
            ],
        }],
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}
