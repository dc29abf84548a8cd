//! Vision provider implementations.
//!
//! `build(config, api_key)` is the factory — called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod gemini;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{ProviderError, VisionProvider};

/// Construct a `VisionProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML).
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<VisionProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(VisionProvider::Dummy(dummy::DummyProvider::default())),
        "gemini" => {
            let g = &config.gemini;
            let api_key = api_key
                .ok_or_else(|| ProviderError::Client("gemini provider requires an API key".into()))?;
            let p = gemini::GeminiProvider::new(
                g.custom_base_url.clone().unwrap_or_else(|| g.api_base_url.clone()),
                g.custom_base_url.is_some(),
                g.model.clone(),
                g.timeout_seconds,
                g.proxy_url.as_deref(),
                api_key,
            )?;
            Ok(VisionProvider::Gemini(p))
        }
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                oai.proxy_url.as_deref(),
                api_key,
            )?;
            Ok(VisionProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
