//! CLI configuration loader for codebutler
//!
//! Loads a single source, first match wins, then applies flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./codebutler.{json,toml,yaml} or ./.codebutler/config.*
//! 3. Git repository root: <repo_root>/.codebutler/config.*
//! 4. XDG config: $XDG_CONFIG_HOME/codebutler/config.* or the platform config dir
//! 5. Environment variables only (no files)

use anyhow::{anyhow, bail, Context, Result};
use codebutler_core::{AgentConfig, ModelParams, Protocol, ResolvedLlmConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "codebutler";
const EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

/// Protocols that can be configured from the environment alone, with their key variable
const ENV_API_KEYS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("azure_openai", "AZURE_OPENAI_API_KEY"),
];

/// Raw configuration file format
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    pub protocol: String,
    /// API key (can be "env:VAR_NAME" for environment variable)
    pub api_key: String,
    /// Base URL (optional, uses protocol default if not specified)
    pub base_url: Option<String>,
    /// Model name
    pub model: String,
    #[serde(default)]
    pub params: ModelParams,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Agent tuning; every field is optional
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub llm: ResolvedLlmConfig,
    pub agent: AgentConfig,
}

/// CLI configuration loader
#[derive(Default)]
pub struct CliConfigLoader {
    config_override: Option<PathBuf>,
    protocol_override: Option<String>,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
}

impl CliConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    pub fn with_protocol_override(mut self, protocol: String) -> Self {
        self.protocol_override = Some(protocol);
        self
    }

    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Load and resolve configuration
    pub fn load(&self) -> Result<LoadedConfig> {
        let mut config = match &self.config_override {
            Some(override_path) => {
                let path = expand_path(override_path);
                self.load_from_path(&path).with_context(|| {
                    format!("Failed to load config from override path: {}", path.display())
                })?
            }
            None => self.search_and_load()?,
        };

        if let Some(protocol) = &self.protocol_override {
            config.protocol = protocol.clone();
        }
        if let Some(api_key) = &self.api_key_override {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = model.clone();
        }

        resolve_config(config)
    }

    fn search_and_load(&self) -> Result<RawConfig> {
        let cwd = std::env::current_dir()?;
        let candidates = [
            find_config(&cwd, APP_DIR),
            find_config(&cwd.join(format!(".{}", APP_DIR)), "config"),
            find_git_root(&cwd).and_then(|root| {
                find_config(&root.join(format!(".{}", APP_DIR)), "config")
            }),
            xdg_config_dir().and_then(|dir| find_config(&dir.join(APP_DIR), "config")),
        ];

        match candidates.into_iter().flatten().next() {
            Some(path) => load_file(&path),
            None => self.load_env_only(),
        }
    }

    /// Build a configuration from environment variables when no file exists
    fn load_env_only(&self) -> Result<RawConfig> {
        let mut available: Vec<(&str, String)> = ENV_API_KEYS
            .iter()
            .filter_map(|(protocol, var)| {
                std::env::var(var)
                    .ok()
                    .filter(|key| !key.is_empty())
                    .map(|key| (*protocol, key))
            })
            .collect();
        let names = available
            .iter()
            .map(|(protocol, _)| *protocol)
            .collect::<Vec<_>>()
            .join(", ");

        let env_protocol = std::env::var("CODEBUTLER_PROTOCOL").ok();
        let preference = self.protocol_override.as_ref().or(env_protocol.as_ref());

        let (protocol, api_key) = match preference {
            Some(preferred) => {
                let index = available
                    .iter()
                    .position(|(protocol, _)| *protocol == preferred.as_str())
                    .ok_or_else(|| {
                        anyhow!(
                            "Protocol '{}' specified but no corresponding API key found. Available keys: {}",
                            preferred,
                            names
                        )
                    })?;
                available.swap_remove(index)
            }
            None => match available.len() {
                0 => bail!(
                    "No configuration found. Please create a codebutler.json file or set environment variables like OPENAI_API_KEY"
                ),
                1 => available.remove(0),
                _ => bail!(
                    "Multiple API keys detected: {}. Please specify which protocol to use with CODEBUTLER_PROTOCOL or --protocol",
                    names
                ),
            },
        };

        let model = std::env::var("CODEBUTLER_MODEL")
            .ok()
            .unwrap_or_else(|| default_model(protocol).to_string());
        debug!("Using {} configuration from the environment", protocol);

        Ok(RawConfig {
            protocol: protocol.to_string(),
            api_key,
            base_url: std::env::var("CODEBUTLER_BASE_URL").ok(),
            model,
            params: ModelParams::default(),
            headers: HashMap::new(),
            agent: AgentConfig::default(),
        })
    }

    /// Load configuration from a specific path (file or directory)
    fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        if path.is_file() {
            load_file(path)
        } else if path.is_dir() {
            let config_file = find_config(path, "config")
                .ok_or_else(|| anyhow!("No config file found in directory: {}", path.display()))?;
            load_file(&config_file)
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }
}

/// Read a config file; the format follows the extension
fn load_file(path: &Path) -> Result<RawConfig> {
    debug!("Loading config file {}", path.display());
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .and_then(|settings| settings.try_deserialize::<RawConfig>())
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// `<dir>/<stem>.<ext>` for the first supported extension that exists
fn find_config(dir: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn default_model(protocol: &str) -> &'static str {
    match protocol {
        "anthropic" => "claude-3-5-sonnet-20241022",
        "azure_openai" => "gpt-4",
        _ => "gpt-4o",
    }
}

/// Resolve raw config to the values core accepts
fn resolve_config(config: RawConfig) -> Result<LoadedConfig> {
    let protocol = Protocol::parse(&config.protocol);

    let api_key = match config.api_key.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .with_context(|| format!("Environment variable not found: {}", var_name))?,
        None => config.api_key,
    };

    let base_url = match config.base_url {
        Some(base_url) => base_url,
        None => protocol
            .default_base_url()
            .ok_or_else(|| anyhow!("Protocol '{}' requires a base_url", protocol.as_str()))?
            .to_string(),
    };

    let llm = ResolvedLlmConfig::new(protocol, base_url, api_key, config.model)
        .with_params(config.params)
        .with_headers(config.headers);

    llm.validate()
        .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

    Ok(LoadedConfig {
        llm,
        agent: config.agent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_with_agent_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codebutler.toml");
        fs::write(
            &path,
            r#"
protocol = "anthropic"
api_key = "sk-test"
model = "claude-test"

[agent]
max_completed_steps = 4
review_abilities = false
"#,
        )
        .unwrap();

        let loaded = CliConfigLoader::new()
            .with_config_override(path)
            .load()
            .unwrap();
        assert_eq!(loaded.llm.protocol, Protocol::Anthropic);
        assert_eq!(loaded.llm.base_url, "https://api.anthropic.com");
        assert_eq!(loaded.llm.model, "claude-test");
        assert_eq!(loaded.agent.max_completed_steps, 4);
        assert!(!loaded.agent.review_abilities);
        assert_eq!(loaded.agent.retry.plan_retries, 2);
    }

    #[test]
    fn test_directory_override_and_flags() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"protocol": "openai", "api_key": "sk-file", "model": "gpt-4o"}"#,
        )
        .unwrap();

        let loaded = CliConfigLoader::new()
            .with_config_override(dir.path().to_path_buf())
            .with_model_override("gpt-4o-mini".to_string())
            .with_base_url_override("http://localhost:8080/v1".to_string())
            .load()
            .unwrap();
        assert_eq!(loaded.llm.protocol, Protocol::OpenAICompat);
        assert_eq!(loaded.llm.api_key, "sk-file");
        assert_eq!(loaded.llm.model, "gpt-4o-mini");
        assert_eq!(loaded.llm.base_url, "http://localhost:8080/v1");
        assert_eq!(loaded.agent, AgentConfig::default());
    }

    #[test]
    fn test_api_key_from_environment() {
        std::env::set_var("CODEBUTLER_LOADER_TEST_KEY", "sk-env");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codebutler.json");
        fs::write(
            &path,
            r#"{"protocol": "openai", "api_key": "env:CODEBUTLER_LOADER_TEST_KEY", "model": "gpt-4o"}"#,
        )
        .unwrap();

        let loaded = CliConfigLoader::new()
            .with_config_override(path)
            .load()
            .unwrap();
        assert_eq!(loaded.llm.api_key, "sk-env");
    }

    #[test]
    fn test_missing_sources_are_errors() {
        let dir = TempDir::new().unwrap();

        let missing = CliConfigLoader::new()
            .with_config_override(dir.path().join("nope.json"))
            .load();
        assert!(missing.is_err());

        let empty_dir = CliConfigLoader::new()
            .with_config_override(dir.path().to_path_buf())
            .load();
        assert!(empty_dir.is_err());
    }

    #[test]
    fn test_custom_protocol_needs_base_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codebutler.yaml");
        fs::write(&path, "protocol: local\napi_key: none\nmodel: llama\n").unwrap();

        let err = CliConfigLoader::new()
            .with_config_override(path)
            .load()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("requires a base_url"));
    }
}
