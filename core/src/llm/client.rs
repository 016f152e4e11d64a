//! Chat transport seam used by the agent

use super::message::LlmMessage;
use crate::config::ModelParams;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat completion endpoint. One call is one round trip; retries on bad
/// replies are the agent's business, not the client's.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse>;

    fn model_name(&self) -> &str;

    /// Short provider label used in logs and trajectories
    fn provider_name(&self) -> &str;
}

/// One completed chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The assistant reply
    pub message: LlmMessage,
    pub usage: Option<Usage>,
    /// Model that actually answered, as reported by the provider
    pub model: String,
    pub finish_reason: Option<FinishReason>,
}

impl LlmResponse {
    /// Raw text of the reply
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// Cut off by the token limit; the reply is likely truncated JSON
    Length,
    ContentFilter,
    Other(String),
}

/// Per-request sampling options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    /// Ask the provider for a JSON object reply when it supports it
    pub json_response: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.5),
            top_p: None,
            stop: None,
            json_response: true,
        }
    }
}

impl ChatOptions {
    /// Configured model parameters over the defaults
    pub fn from_params(params: &ModelParams) -> Self {
        let defaults = Self::default();
        Self {
            max_tokens: params.max_tokens.or(defaults.max_tokens),
            temperature: params.temperature.or(defaults.temperature),
            top_p: params.top_p.or(defaults.top_p),
            stop: params.stop_sequences.clone(),
            json_response: defaults.json_response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_override_defaults() {
        let options = ChatOptions::from_params(&ModelParams {
            temperature: Some(0.0),
            stop_sequences: Some(vec!["END".to_string()]),
            ..Default::default()
        });
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.max_tokens, Some(4096));
        assert_eq!(options.stop, Some(vec!["END".to_string()]));
        assert!(options.json_response);
    }
}
