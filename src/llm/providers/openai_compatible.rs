//! OpenAI-compatible chat completion provider (`/v1/chat/completions`) with
//! vision input.
//!
//! The image travels as a `data:` URI inside an `image_url` content part,
//! followed by the instruction text. All OpenAI wire types are private to
//! this module — callers never see them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::image::mime_type;
use crate::llm::{LlmResponse, LlmUsage, ProviderError, http_client};

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions` with
/// image content parts (OpenAI, vLLM, LM Studio, Ollama…).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        proxy_url: Option<&str>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = http_client(timeout_seconds, proxy_url)?;
        Ok(Self { client, api_base_url, model, temperature, api_key })
    }

    pub async fn describe_image(&self, image: &[u8], instruction: &str) -> Result<LlmResponse, ProviderError> {
        let payload = build_request(&self.model, self.temperature, image, instruction);

        debug!(
            model = %payload.model,
            image_bytes = image.len(),
            prompt_len = instruction.len(),
            "sending LLM request"
        );

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("failed to read response body: {e}")))?;
        trace!(response = %body, "full LLM response payload");

        parse_response(&body)
    }
}

fn build_request(model: &str, temperature: f32, image: &[u8], instruction: &str) -> ChatCompletionRequest {
    // Some models (gpt-5 family) do not accept a temperature parameter.
    let temperature = if model.starts_with("gpt-5") { None } else { Some(temperature) };
    let data_uri = format!("data:{};base64,{}", mime_type(image), STANDARD.encode(image));

    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![Message {
            role: "user".to_string(),
            content: vec![
                ContentPart::ImageUrl { image_url: ImageUrl { url: data_uri } },
                ContentPart::Text { text: instruction.to_string() },
            ],
        }],
        temperature,
    }
}

fn parse_response(body: &str) -> Result<LlmResponse, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "failed to deserialize LLM response");
        ProviderError::Request(format!("failed to parse response body: {e}"))
    })?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::EmptyResponse)?;

    let usage = parsed.usage.map(|u| LlmUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u.total_tokens.unwrap_or(u.prompt_tokens + u.completion_tokens),
    });

    Ok(LlmResponse { text, usage })
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = error_message(status, &body);
    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_provider() {
        let provider = OpenAiCompatibleProvider::new(
            "http://127.0.0.1:8081/v1/chat/completions".to_string(),
            "qwen2.5-vl".to_string(),
            0.2,
            5,
            None,
            None,
        );
        assert!(provider.is_ok());
    }

    #[test]
    fn request_embeds_data_uri() {
        let req = build_request("gpt-4o-mini", 0.0, b"\xFF\xD8\xFF\xE0\0\0\0\0\0\0\0\0", "classify");
        let v = serde_json::to_value(&req).unwrap();
        let content = &v["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image_url");
        assert!(content[0]["image_url"]["url"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], "classify");
        assert_eq!(v["temperature"], 0.0);
    }

    #[test]
    fn gpt5_omits_temperature() {
        let req = build_request("gpt-5-mini", 0.2, b"x", "p");
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("temperature").is_none());
    }

    #[test]
    fn parses_choice_and_usage() {
        let body = r#"{"choices":[{"message":{"content":" {\"cate\":[\"美食\"]} "}}],
            "usage":{"prompt_tokens":7,"completion_tokens":3}}"#;
        let r = parse_response(body).unwrap();
        assert_eq!(r.text, r#"{"cate":["美食"]}"#);
        assert_eq!(r.total_tokens(), 10);
    }

    #[test]
    fn null_content_is_empty_response() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(parse_response(body), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn error_envelope_is_summarised() {
        let msg = error_message(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#,
        );
        assert!(msg.contains("401"));
        assert!(msg.contains("[code=invalid_api_key]"));
        assert!(msg.contains("bad key"));
    }
}
