//! # codebutler Core
//!
//! Core library for codebutler - an agent that turns a natural-language task
//! into a list of steps, runs one step per call and re-plans the rest after
//! each result.
//!
//! The building blocks are an LLM client, a task store, an ability registry
//! bound to a per-task workspace, and the [`StepAgent`] that drives them.

// Core modules
pub mod abilities;
pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod store;
pub mod trajectory;
pub mod workspace;

// Re-export commonly used types
pub use abilities::{Ability, AbilityRegistry};
pub use agent::{Agent, AgentBuilder, AgentConfig, AgentExecution, StepAgent, StepObserver};
pub use config::{ModelParams, Protocol, ResolvedLlmConfig};
pub use error::{Error, Result};
pub use store::{InMemoryStore, SqliteStore, Step, Task, TaskStore};
pub use trajectory::TrajectoryRecorder;
pub use workspace::{LocalWorkspace, Workspace};

/// Current version of the codebutler-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}
