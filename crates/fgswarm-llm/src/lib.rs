pub mod providers;
pub mod retry;
pub mod streaming;

use std::sync::Arc;

use fgswarm_core::config::ModelConfig;
use fgswarm_core::error::{FgError, Result};
use fgswarm_core::traits::LlmClient;

pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
///
/// Every supported provider speaks the OpenAI chat-completions protocol; the
/// client is wrapped in a [`RetryingClient`] only when `[model.retry]` is set.
pub fn create_client(config: &ModelConfig) -> Result<Arc<dyn LlmClient>> {
    let base: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" | "ollama" | "vllm" | "groq" | "openrouter" | "compatible" => {
            Box::new(OpenAiClient::new())
        }
        other => return Err(FgError::UnsupportedProvider(other.to_string())),
    };

    Ok(match &config.retry {
        Some(retry) => Arc::new(RetryingClient::new(base, retry.clone())),
        None => Arc::from(base),
    })
}
