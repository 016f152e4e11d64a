//! OpenAI-compatible chat client built on async-openai

use crate::config::ResolvedLlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{ChatOptions, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageRole, Usage};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ResponseFormat, Stop,
    },
    Client,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use tracing::{debug, error};

/// Client for OpenAI, Azure OpenAI and any server exposing the same API
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: format!("no API key configured for {}", config.protocol.as_str()),
            }
            .into());
        }

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(config.base_url.trim_end_matches('/'));

        let http_client = reqwest::Client::builder()
            .default_headers(header_map(&config.headers)?)
            .build()
            .map_err(|e| LlmError::InvalidRequest {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model.clone(),
        })
    }

    fn build_request(
        &self,
        messages: Vec<LlmMessage>,
        options: ChatOptions,
    ) -> Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages.into_iter().map(to_request_message).collect::<Vec<_>>());

        if let Some(max_tokens) = options.max_tokens {
            args.max_tokens(max_tokens);
        }
        if let Some(temperature) = options.temperature {
            args.temperature(temperature);
        }
        if let Some(top_p) = options.top_p {
            args.top_p(top_p);
        }
        if let Some(stop) = options.stop {
            args.stop(Stop::StringArray(stop));
        }
        if options.json_response {
            args.response_format(ResponseFormat::JsonObject);
        }

        args.build().map_err(|e| {
            LlmError::InvalidRequest {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Configured extra headers, checked up front so a bad name fails at startup
fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| LlmError::InvalidRequest {
            message: format!("invalid header name '{}': {}", key, e),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| LlmError::InvalidRequest {
            message: format!("invalid value for header '{}': {}", key, e),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

fn to_request_message(message: LlmMessage) -> ChatCompletionRequestMessage {
    match message.role {
        MessageRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: message.content.into(),
                name: None,
            })
        }
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: message.content.into(),
            name: None,
        }),
        MessageRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    message.content,
                )),
                ..Default::default()
            })
        }
    }
}

fn from_response(response: CreateChatCompletionResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;

    let finish_reason = choice.finish_reason.map(|reason| {
        use async_openai::types::FinishReason as Reason;
        match reason {
            Reason::Stop => FinishReason::Stop,
            Reason::Length => FinishReason::Length,
            Reason::ContentFilter => FinishReason::ContentFilter,
            other => FinishReason::Other(format!("{:?}", other)),
        }
    });

    Ok(LlmResponse {
        message: LlmMessage::assistant(choice.message.content.unwrap_or_default()),
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        model: response.model,
        finish_reason,
    })
}

/// Connection problems become `Network`; anything the server answered is an `ApiError`
fn map_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) => match e.status() {
            Some(status) => LlmError::ApiError {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => LlmError::Network {
                message: e.to_string(),
            },
        },
        OpenAIError::InvalidArgument(message) => LlmError::InvalidRequest { message },
        // the API error body carries no HTTP status
        other => LlmError::ApiError {
            status: 0,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, options.unwrap_or_default())?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            error!("OpenAI request failed: {}", e);
            map_error(e)
        })?;

        let response = from_response(response)?;
        if let Some(usage) = response.usage {
            debug!(
                "{} usage: {} prompt + {} completion tokens",
                self.model, usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::error::Error;

    fn config(headers: &[(&str, &str)]) -> ResolvedLlmConfig {
        ResolvedLlmConfig::new(
            Protocol::OpenAICompat,
            "https://api.openai.com/v1/".to_string(),
            "key".to_string(),
            "gpt-4o".to_string(),
        )
        .with_headers(
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_configured_headers_are_sent() {
        let config = config(&[("X-Team", "butlers"), ("OpenAI-Organization", "org-1")]);
        let map = header_map(&config.headers).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x-team").unwrap(), "butlers");
        assert_eq!(map.get("openai-organization").unwrap(), "org-1");
    }

    #[test]
    fn test_invalid_header_fails_client_creation() {
        let result = OpenAiClient::new(&config(&[("bad header", "value")]));
        assert!(matches!(result, Err(Error::Llm(LlmError::InvalidRequest { .. }))));
    }

    #[test]
    fn test_client_with_headers_is_built() {
        let client = OpenAiClient::new(&config(&[("X-Team", "butlers")])).unwrap();
        assert_eq!(client.model_name(), "gpt-4o");
    }
}
