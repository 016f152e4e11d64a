//! Resolved configuration types for codebutler core
//!
//! Discovery, file formats and `env:` indirection belong to the CLI; core
//! only sees the values below.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire protocol spoken by the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Any endpoint speaking the OpenAI chat completions API
    #[serde(rename = "openai_compat")]
    OpenAICompat,
    Anthropic,
    #[serde(rename = "azure_openai")]
    AzureOpenAI,
    /// Unknown name; no client can be created for it
    Custom(String),
}

impl Protocol {
    /// Parse the protocol names accepted in configuration files and flags
    pub fn parse(name: &str) -> Self {
        match name {
            "openai" | "openai_compat" => Protocol::OpenAICompat,
            "anthropic" => Protocol::Anthropic,
            "azure_openai" | "azure" => Protocol::AzureOpenAI,
            other => Protocol::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::OpenAICompat => "openai_compat",
            Protocol::Anthropic => "anthropic",
            Protocol::AzureOpenAI => "azure_openai",
            Protocol::Custom(name) => name,
        }
    }

    /// Public endpoint for protocols that have one; Azure deployments always
    /// need an explicit URL
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Protocol::OpenAICompat => Some("https://api.openai.com/v1"),
            Protocol::Anthropic => Some("https://api.anthropic.com"),
            Protocol::AzureOpenAI | Protocol::Custom(_) => None,
        }
    }
}

/// Sampling parameters; unset values fall back to the chat defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub max_tokens: Option<u32>,
    /// 0.0 to 2.0
    pub temperature: Option<f32>,
    /// 0.0 to 1.0
    pub top_p: Option<f32>,
    pub stop_sequences: Option<Vec<String>>,
}

/// Everything needed to open a chat client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLlmConfig {
    pub protocol: Protocol,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub params: ModelParams,
    /// Sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ResolvedLlmConfig {
    pub fn new(protocol: Protocol, base_url: String, api_key: String, model: String) -> Self {
        Self {
            protocol,
            base_url,
            api_key,
            model,
            params: ModelParams::default(),
            headers: HashMap::new(),
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Reject configurations no provider could use
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("api_key", &self.api_key),
            ("model", &self.model),
            ("base_url", &self.base_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(invalid("base_url", &self.base_url));
        }

        match self.params.temperature {
            Some(t) if !(0.0..=2.0).contains(&t) => Err(invalid("temperature", t)),
            _ => match self.params.top_p {
                Some(p) if !(0.0..=1.0).contains(&p) => Err(invalid("top_p", p)),
                _ => Ok(()),
            },
        }
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
