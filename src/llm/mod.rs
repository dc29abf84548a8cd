//! Vision LLM provider abstraction.
//!
//! `VisionProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! One call = one "classify this image" round-trip; retries are the caller's
//! business.

pub mod image;
pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// HTTP client or request construction failed.
    #[error("provider client construction failed: {0}")]
    Client(String),
    /// Transport failure or non-success status from the generate call.
    #[error("provider request failed: {0}")]
    Request(String),
    /// The call succeeded but carried no text.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

// ── Response ──────────────────────────────────────────────────────────────────

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Raw model reply plus usage, if the provider reported any.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u64 {
        self.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `describe_image` arm.
#[derive(Debug, Clone)]
pub enum VisionProvider {
    Dummy(providers::dummy::DummyProvider),
    Gemini(providers::gemini::GeminiProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl VisionProvider {
    /// Send `image` together with `instruction` and return the model's raw reply.
    pub async fn describe_image(&self, image: &[u8], instruction: &str) -> Result<LlmResponse, ProviderError> {
        match self {
            VisionProvider::Dummy(p) => p.describe_image(image, instruction).await,
            VisionProvider::Gemini(p) => p.describe_image(image, instruction).await,
            VisionProvider::OpenAiCompatible(p) => p.describe_image(image, instruction).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VisionProvider::Dummy(_) => "dummy",
            VisionProvider::Gemini(_) => "gemini",
            VisionProvider::OpenAiCompatible(_) => "openai",
        }
    }
}

/// Shared `reqwest::Client` construction: per-request timeout and optional proxy.
pub(crate) fn http_client(
    timeout_seconds: u64,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds));
    if let Some(proxy) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| ProviderError::Client(format!("invalid proxy url '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ProviderError::Client(format!("failed to build HTTP client: {e}")))
}
