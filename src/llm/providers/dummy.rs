//! Dummy vision provider — returns a fixed reply without any network call.
//! Used for dry runs and for testing the pipeline without an API key.

use crate::llm::{LlmResponse, LlmUsage, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider {
    reply: String,
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self { reply: r#"{"cate":[]}"#.to_string() }
    }
}

impl DummyProvider {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }

    pub async fn describe_image(&self, image: &[u8], instruction: &str) -> Result<LlmResponse, ProviderError> {
        if self.reply.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(LlmResponse {
            text: self.reply.clone(),
            usage: Some(LlmUsage {
                input_tokens: (image.len() + instruction.len()) as u64,
                output_tokens: self.reply.len() as u64,
                total_tokens: (image.len() + instruction.len() + self.reply.len()) as u64,
            }),
        })
    }
}
