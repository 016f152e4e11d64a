//! Error types and handling for codebutler core

use thiserror::Error;

/// Result type alias for codebutler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for codebutler core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// LLM client errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Ability lookup and execution errors
    #[error("Ability error: {0}")]
    Ability(#[from] AbilityError),

    /// Agent execution errors
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Task and step persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Workspace file errors
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Trajectory recording errors
    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },
}

/// LLM client errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Empty response from model")]
    EmptyResponse,
}

/// Ability lookup and execution errors
#[derive(Error, Debug)]
pub enum AbilityError {
    #[error("Ability not found: {name}")]
    NotFound { name: String },

    #[error("Invalid arguments for ability {name}: {message}")]
    InvalidArguments { name: String, message: String },

    #[error("Ability execution failed: {name} - {message}")]
    ExecutionFailed { name: String, message: String },
}

/// Agent execution errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to create steps after {attempts} attempts: {reason}")]
    RetryLimitExceeded { attempts: u32, reason: String },

    #[error("Step {step_id} has no ability to run")]
    MissingAbility { step_id: String },

    #[error("Maximum turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },
}

/// Task and step store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Step not found: {step_id} (task {task_id})")]
    StepNotFound { task_id: String, step_id: String },

    #[error("Step {step_id} is already completed and cannot change")]
    StepFinalized { step_id: String },

    #[error("Unknown step status: {value}")]
    InvalidStatus { value: String },
}

/// Workspace errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Path escapes the task workspace: {path}")]
    PathEscape { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

/// Prompt template errors
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Unknown template '{name}' in set '{set}'")]
    UnknownTemplate { set: String, name: String },

    #[error("Failed to register template '{name}': {message}")]
    InvalidTemplate { name: String, message: String },

    #[error("Failed to render template '{name}': {message}")]
    RenderFailed { name: String, message: String },
}

/// Trajectory recording errors
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("Failed to record trajectory: {message}")]
    RecordingFailed { message: String },
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Generic(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Generic(msg.to_string())
    }
}
