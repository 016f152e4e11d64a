//! Agent core logic: planning, step execution and re-planning

pub mod answer;
pub mod base;
pub mod config;
pub mod core;
pub mod execution;
pub mod profile;
pub mod retry;
pub mod review;
pub mod validate;

pub use answer::{parse_answer, parse_json, ModelAnswer, PlannedStep, ProposedStep, Thoughts};
pub use base::{Agent, AgentResult, NullObserver, StepObserver};
pub use config::{AgentBuilder, AgentConfig, RetryPolicy};
pub use core::{StepAgent, PLAN_STEP_INPUT, PLAN_STEP_NAME};
pub use execution::AgentExecution;
pub use profile::AgentProfile;
pub use retry::RequestMode;
pub use validate::{validate_ability, AbilityViolation};

#[cfg(test)]
mod tests;
