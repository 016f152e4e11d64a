//! Agent configuration structures

use super::core::{Prompts, StepAgent};
use crate::abilities::AbilityRegistry;
use crate::config::ResolvedLlmConfig;
use crate::error::Result;
use crate::llm::{create_client, ChatOptions, LlmClient};
use crate::store::{InMemoryStore, TaskStore};
use crate::trajectory::TrajectoryRecorder;
use crate::workspace::LocalWorkspace;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Directory used for task files when no ability registry is supplied
pub const DEFAULT_WORKSPACE_DIR: &str = "workspace";

/// How many times a rejected model reply may be asked for again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries when creating the initial plan
    pub plan_retries: u32,

    /// Retries when reviewing the remaining steps after an execution
    pub review_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            plan_retries: 2,
            review_retries: 0,
        }
    }
}

/// Configuration for an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Once more steps than this are completed the current step is forced to be the last
    pub max_completed_steps: usize,

    pub retry: RetryPolicy,

    /// Ask the model to double-check each ability before running it
    pub review_abilities: bool,

    /// Ask the model for a role to plan as before planning
    pub generate_profile: bool,

    /// Page size used when reading a task's steps
    pub steps_per_page: usize,

    /// Upper bound on `execute_step` calls made by `run_task`
    pub max_turns: usize,

    /// Directory with `<set>/<name>.hbs` prompt overrides
    pub prompt_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_completed_steps: 15,
            retry: RetryPolicy::default(),
            review_abilities: true,
            generate_profile: false,
            steps_per_page: 100,
            max_turns: 50,
            prompt_dir: None,
        }
    }
}

enum LlmSource {
    Config(ResolvedLlmConfig),
    Client(Arc<dyn LlmClient>),
}

/// Builder for [`StepAgent`]
pub struct AgentBuilder {
    llm: LlmSource,
    agent_config: AgentConfig,
    store: Option<Arc<dyn TaskStore>>,
    abilities: Option<Arc<AbilityRegistry>>,
    trajectory_recorder: Option<Arc<TrajectoryRecorder>>,
}

impl AgentBuilder {
    /// Create a builder that will connect using the resolved LLM configuration
    pub fn new(llm_config: ResolvedLlmConfig) -> Self {
        Self::from_source(LlmSource::Config(llm_config))
    }

    /// Create a builder around an existing chat client
    pub fn with_client(client: Arc<dyn LlmClient>) -> Self {
        Self::from_source(LlmSource::Client(client))
    }

    fn from_source(llm: LlmSource) -> Self {
        Self {
            llm,
            agent_config: AgentConfig::default(),
            store: None,
            abilities: None,
            trajectory_recorder: None,
        }
    }

    pub fn with_agent_config(mut self, agent_config: AgentConfig) -> Self {
        self.agent_config = agent_config;
        self
    }

    pub fn with_max_completed_steps(mut self, max_completed_steps: usize) -> Self {
        self.agent_config.max_completed_steps = max_completed_steps;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.agent_config.retry = retry;
        self
    }

    pub fn with_review_abilities(mut self, review_abilities: bool) -> Self {
        self.agent_config.review_abilities = review_abilities;
        self
    }

    pub fn with_prompt_dir(mut self, prompt_dir: Option<PathBuf>) -> Self {
        self.agent_config.prompt_dir = prompt_dir;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_abilities(mut self, abilities: Arc<AbilityRegistry>) -> Self {
        self.abilities = Some(abilities);
        self
    }

    pub fn with_trajectory_recorder(mut self, recorder: Arc<TrajectoryRecorder>) -> Self {
        self.trajectory_recorder = Some(recorder);
        self
    }

    /// Build the agent, creating the chat client and loading prompt templates
    pub fn build(self) -> Result<StepAgent> {
        let (llm, chat_options) = match self.llm {
            LlmSource::Config(config) => {
                config.validate()?;
                let options = ChatOptions::from_params(&config.params);
                (create_client(&config)?, options)
            }
            LlmSource::Client(client) => (client, ChatOptions::default()),
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()) as Arc<dyn TaskStore>);
        let abilities = self.abilities.unwrap_or_else(|| {
            Arc::new(AbilityRegistry::with_builtin(Arc::new(LocalWorkspace::new(
                DEFAULT_WORKSPACE_DIR,
            ))))
        });
        let prompts = Prompts::load(self.agent_config.prompt_dir.as_deref())?;

        Ok(StepAgent::new(
            self.agent_config,
            llm,
            chat_options,
            store,
            abilities,
            prompts,
            self.trajectory_recorder,
        ))
    }
}
