//! Chat completion providers

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use crate::config::{Protocol, ResolvedLlmConfig};
use crate::error::{ConfigError, Result};
use crate::llm::LlmClient;
use std::sync::Arc;

/// Create the chat transport matching the configured protocol
pub fn create_client(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match &config.protocol {
        Protocol::OpenAICompat | Protocol::AzureOpenAI => Arc::new(OpenAiClient::new(config)?),
        Protocol::Anthropic => Arc::new(AnthropicClient::new(config)?),
        Protocol::Custom(name) => {
            return Err(ConfigError::UnsupportedProtocol {
                protocol: name.clone(),
            }
            .into())
        }
    };

    tracing::info!(
        "Using {} model {}",
        client.provider_name(),
        client.model_name()
    );
    Ok(client)
}
