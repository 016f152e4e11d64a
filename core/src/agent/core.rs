//! StepAgent: plans a task into steps and executes them one at a time

use super::answer::PlannedStep;
use super::base::{Agent, AgentResult, StepObserver};
use super::config::AgentConfig;
use super::execution::AgentExecution;
use super::retry::RequestMode;
use crate::abilities::{AbilityRegistry, FINISH_ABILITY};
use crate::error::{AgentError, Result};
use crate::llm::{ChatOptions, LlmClient, LlmMessage, LlmResponse};
use crate::prompt::{PromptEngine, AGENT_PROFILE, PLAN_STEPS, REVIEW_STEPS, RUN_ABILITY};
use crate::store::{
    list_all_steps, AbilityRef, Step, StepRequest, StepStatus, StepUpdate, Task, TaskRequest,
    TaskStore,
};
use crate::trajectory::{TrajectoryEntry, TrajectoryRecorder};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Name of the placeholder step recorded for the planning call
pub const PLAN_STEP_NAME: &str = "Plan steps";

/// Input of the planning step when the request carries none
pub const PLAN_STEP_INPUT: &str = "Create steps to accomplish the objective";

/// Template sets used by the agent
pub(crate) struct Prompts {
    pub(super) plan: PromptEngine,
    pub(super) review: PromptEngine,
    pub(super) run_ability: PromptEngine,
    pub(super) profile: PromptEngine,
}

impl Prompts {
    pub(super) fn load(dir: Option<&Path>) -> Result<Self> {
        Ok(Self {
            plan: PromptEngine::with_override_dir(PLAN_STEPS, dir)?,
            review: PromptEngine::with_override_dir(REVIEW_STEPS, dir)?,
            run_ability: PromptEngine::with_override_dir(RUN_ABILITY, dir)?,
            profile: PromptEngine::with_override_dir(AGENT_PROFILE, dir)?,
        })
    }
}

/// How a step is shown to the model
#[derive(Serialize)]
pub(super) struct StepSummary<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub ability: Option<&'a AbilityRef>,
    pub output: Option<&'a str>,
}

impl<'a> StepSummary<'a> {
    pub(super) fn of(step: &'a Step) -> Self {
        Self {
            name: &step.name,
            description: &step.input,
            ability: step.ability.as_ref(),
            output: step.output.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct PlanSystemPrompt<'a> {
    abilities: String,
    files: Vec<String>,
    role: Option<&'a str>,
    role_description: Option<&'a str>,
}

#[derive(Serialize)]
struct ReviewSystemPrompt {
    abilities: String,
    files: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct TaskPrompt<'a> {
    pub task: &'a str,
}

#[derive(Serialize)]
struct ReviewUserPrompt<'a> {
    task: &'a str,
    step: StepSummary<'a>,
    next_steps: Option<String>,
    previous_steps: Vec<StepSummary<'a>>,
}

/// First `max` characters of `text`, with an ellipsis when cut
pub(super) fn preview(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

/// Ability output as stored on a step; `null` means no output
fn output_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Agent that plans a task, then runs one step per `execute_step` call and
/// re-plans the remaining steps after each one
pub struct StepAgent {
    pub(super) config: AgentConfig,
    pub(super) llm: Arc<dyn LlmClient>,
    pub(super) chat_options: ChatOptions,
    pub(super) store: Arc<dyn TaskStore>,
    pub(super) abilities: Arc<AbilityRegistry>,
    pub(super) prompts: Prompts,
    pub(super) trajectory_recorder: Option<Arc<TrajectoryRecorder>>,
}

impl StepAgent {
    pub(super) fn new(
        config: AgentConfig,
        llm: Arc<dyn LlmClient>,
        chat_options: ChatOptions,
        store: Arc<dyn TaskStore>,
        abilities: Arc<AbilityRegistry>,
        prompts: Prompts,
        trajectory_recorder: Option<Arc<TrajectoryRecorder>>,
    ) -> Self {
        Self {
            config,
            llm,
            chat_options,
            store,
            abilities,
            prompts,
            trajectory_recorder,
        }
    }

    pub fn store(&self) -> Arc<dyn TaskStore> {
        Arc::clone(&self.store)
    }

    pub fn abilities(&self) -> Arc<AbilityRegistry> {
        Arc::clone(&self.abilities)
    }

    pub fn trajectory_recorder(&self) -> Option<&Arc<TrajectoryRecorder>> {
        self.trajectory_recorder.as_ref()
    }

    pub(super) async fn record(&self, entry: TrajectoryEntry) -> Result<()> {
        if let Some(recorder) = &self.trajectory_recorder {
            recorder.record(entry).await?;
        }
        Ok(())
    }

    /// Record an error entry; a failed write is logged so `error` stays the one returned
    async fn record_failure(&self, task_id: &str, error: &crate::error::Error) {
        if let Err(e) = self
            .record(TrajectoryEntry::error(task_id, error.to_string()))
            .await
        {
            warn!("Could not record failure for task {}: {}", task_id, e);
        }
    }

    /// One chat round trip, recorded in the trajectory under `purpose`
    pub(super) async fn chat(
        &self,
        task_id: &str,
        purpose: &str,
        messages: Vec<LlmMessage>,
    ) -> Result<LlmResponse> {
        debug!("Sending {} messages for {}", messages.len(), purpose);
        if let Some(recorder) = &self.trajectory_recorder {
            recorder
                .record(TrajectoryEntry::llm_request(
                    task_id,
                    purpose,
                    messages.clone(),
                    self.llm.model_name(),
                    self.llm.provider_name(),
                ))
                .await?;
        }

        let response = self
            .llm
            .chat_completion(messages, Some(self.chat_options.clone()))
            .await?;
        debug!("Response for {}:\n{}", purpose, response.content());

        self.record(TrajectoryEntry::llm_response(
            task_id,
            response.content(),
            response.usage.clone(),
        ))
        .await?;
        Ok(response)
    }

    async fn workspace_files(&self, task_id: &str) -> Result<Vec<String>> {
        self.abilities.workspace().list(task_id, "/").await
    }

    /// Create the planning step, ask the model for a plan and persist it.
    ///
    /// Returns the planning step, completed with the model's summary as output.
    /// If planning fails the planning step is marked skipped so the next call
    /// plans again.
    pub async fn plan_steps(&self, task: &Task, request: StepRequest) -> Result<Step> {
        let input = request
            .input
            .filter(|input| !input.trim().is_empty())
            .unwrap_or_else(|| PLAN_STEP_INPUT.to_string());
        debug!("Create step {}:\n{}", PLAN_STEP_NAME, input);

        let placeholder = self
            .store
            .create_step(
                &task.task_id,
                StepRequest {
                    name: Some(PLAN_STEP_NAME.to_string()),
                    input: Some(input),
                    ability: None,
                    additional_input: request.additional_input,
                },
                false,
            )
            .await?;

        match self.plan_into(task, &placeholder).await {
            Ok(step) => Ok(step),
            Err(e) => {
                error!("Planning failed for task {}: {}", task.task_id, e);
                if let Err(skip_err) = self
                    .store
                    .update_step(&task.task_id, &placeholder.step_id, StepUpdate::skipped())
                    .await
                {
                    warn!("Could not skip the planning step: {}", skip_err);
                }
                self.record_failure(&task.task_id, &e).await;
                Err(e)
            }
        }
    }

    async fn plan_into(&self, task: &Task, placeholder: &Step) -> Result<Step> {
        let files = self.workspace_files(&task.task_id).await?;
        debug!("Files: {:?}", files);

        let profile = if self.config.generate_profile {
            self.generate_profile(task).await?
        } else {
            None
        };

        let system_prompt = self.prompts.plan.load_prompt(
            "system-prompt",
            &PlanSystemPrompt {
                abilities: self.abilities.list_abilities_for_prompt(),
                files,
                role: profile.as_ref().map(|p| p.role.as_str()),
                role_description: profile.as_ref().map(|p| p.description.as_str()),
            },
        )?;
        let step_format = self.prompts.plan.load_prompt("step-format", &json!({}))?;
        let task_prompt = self
            .prompts
            .plan
            .load_prompt("user-prompt", &TaskPrompt { task: &task.input })?;

        let messages = vec![
            LlmMessage::system(system_prompt),
            LlmMessage::system(step_format),
            LlmMessage::user(task_prompt),
        ];

        let answer = self
            .request_steps(&task.task_id, PLAN_STEPS, messages, RequestMode::Plan)
            .await?;

        self.create_steps(&task.task_id, &answer.steps).await?;
        let step = self
            .store
            .update_step(
                &task.task_id,
                &placeholder.step_id,
                StepUpdate::completed(Some(answer.thoughts_text())),
            )
            .await?;

        info!(
            "Planned {} steps for task {}",
            answer.steps.len(),
            task.task_id
        );
        self.record(TrajectoryEntry::step_completed(
            &task.task_id,
            &step.step_id,
            &step.name,
            false,
        ))
        .await?;
        Ok(step)
    }

    /// Persist planned steps in order
    pub async fn create_steps(&self, task_id: &str, steps: &[PlannedStep]) -> Result<Vec<Step>> {
        let mut created = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            info!(
                "Create step {} {}: {} ({})",
                i + 1,
                step.name.as_deref().unwrap_or_default(),
                step.description,
                step.ability.name
            );
            let request = StepRequest {
                name: step.name.clone(),
                input: Some(step.description.clone()),
                ability: Some(step.ability.clone()),
                additional_input: None,
            };
            created.push(self.store.create_step(task_id, request, false).await?);
        }
        Ok(created)
    }

    /// Ask the model whether the pending steps still fit; replace them when it
    /// proposes new ones. Returns how many steps are pending afterwards.
    async fn review_steps(
        &self,
        task: &Task,
        current: &Step,
        ability: &AbilityRef,
        output: Option<&str>,
        previous: &[Step],
        next: &[Step],
    ) -> Result<usize> {
        let system_prompt = self.prompts.review.load_prompt(
            "system-prompt",
            &ReviewSystemPrompt {
                abilities: self.abilities.list_abilities_for_prompt(),
                files: self.workspace_files(&task.task_id).await?,
            },
        )?;
        let step_format = self.prompts.review.load_prompt("step-format", &json!({}))?;

        debug!(
            "Will review {} next steps ({} steps have been completed)",
            next.len(),
            previous.len()
        );
        let next_steps = if next.is_empty() {
            None
        } else {
            let pending: Vec<StepSummary> = next.iter().map(StepSummary::of).collect();
            Some(serde_json::to_string(&pending)?)
        };

        let task_prompt = self.prompts.review.load_prompt(
            "user-prompt",
            &ReviewUserPrompt {
                task: &task.input,
                step: StepSummary {
                    name: &current.name,
                    description: &current.input,
                    ability: Some(ability),
                    output,
                },
                next_steps,
                previous_steps: previous.iter().map(StepSummary::of).collect(),
            },
        )?;

        let messages = vec![
            LlmMessage::system(system_prompt),
            LlmMessage::system(step_format),
            LlmMessage::user(task_prompt),
        ];
        let answer = self
            .request_steps(&task.task_id, REVIEW_STEPS, messages, RequestMode::Review)
            .await?;

        if answer.steps.is_empty() {
            info!("No new steps provided");
            return Ok(next.len());
        }

        info!(
            "Replace {} steps with {} new steps",
            next.len(),
            answer.steps.len()
        );
        let mut skipped = Vec::with_capacity(next.len());
        for step in next {
            self.store
                .update_step(&task.task_id, &step.step_id, StepUpdate::skipped())
                .await?;
            skipped.push(step.step_id.clone());
        }

        let created = self.create_steps(&task.task_id, &answer.steps).await?;
        self.record(TrajectoryEntry::replan(
            &task.task_id,
            skipped,
            created.iter().map(|s| s.step_id.clone()).collect(),
        ))
        .await?;
        Ok(created.len())
    }

    /// Call `execute_step` until a step is flagged last, the observer stops
    /// the run or `max_turns` calls have been made
    pub async fn run_task(
        &self,
        task_id: &str,
        observer: &dyn StepObserver,
    ) -> Result<AgentExecution> {
        let start = Instant::now();
        let mut steps_executed = 0;
        let mut final_result = String::new();

        for turn in 1..=self.config.max_turns {
            observer.step_started(turn).await;

            let step = match self.execute_step(task_id, StepRequest::default()).await {
                Ok(step) => step,
                Err(e) => {
                    error!("Step failed for task {}: {}", task_id, e);
                    self.record_failure(task_id, &e).await;
                    return Err(e);
                }
            };
            steps_executed += 1;
            if let Some(output) = &step.output {
                final_result = output.clone();
            }

            let proceed = observer.step_finished(&step).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let execution = if step.is_last {
                AgentExecution::success(task_id, final_result, steps_executed, duration_ms)
            } else if !proceed {
                AgentExecution::failure(
                    task_id,
                    "stopped before the task finished".to_string(),
                    steps_executed,
                    duration_ms,
                )
            } else {
                continue;
            };

            return self.finish_run(execution).await;
        }

        let max_turns = self.config.max_turns;
        warn!("Task {} did not finish within {} turns", task_id, max_turns);
        let execution = AgentExecution::failure(
            task_id,
            AgentError::MaxTurnsExceeded { max_turns }.to_string(),
            steps_executed,
            start.elapsed().as_millis() as u64,
        );
        self.finish_run(execution).await
    }

    async fn finish_run(&self, execution: AgentExecution) -> Result<AgentExecution> {
        self.record(TrajectoryEntry::task_complete(
            &execution.task_id,
            execution.success,
            execution.final_result.clone(),
            execution.steps_executed,
            execution.duration_ms,
        ))
        .await?;
        Ok(execution)
    }
}

#[async_trait]
impl Agent for StepAgent {
    async fn create_task(&self, request: TaskRequest) -> AgentResult<Task> {
        let task = self.store.create_task(request).await?;
        info!(
            "Task created: {} input: {}",
            task.task_id,
            preview(&task.input, 40)
        );
        self.record(TrajectoryEntry::task_start(&task.task_id, &task.input))
            .await?;
        Ok(task)
    }

    async fn execute_step(&self, task_id: &str, request: StepRequest) -> AgentResult<Step> {
        let task = self.store.get_task(task_id).await?;
        info!(
            "Execute step for task {} input: {}",
            task.task_id,
            preview(&task.input, 19)
        );

        let steps = list_all_steps(self.store.as_ref(), task_id, self.config.steps_per_page).await?;
        let (previous, pending): (Vec<Step>, Vec<Step>) = steps
            .into_iter()
            .filter(|s| s.status != StepStatus::Skipped)
            .partition(|s| s.status == StepStatus::Completed);

        if previous.is_empty() && pending.is_empty() {
            info!("No steps found, create plan steps");
            return self.plan_steps(&task, request).await;
        }

        let Some((current, next)) = pending.split_first() else {
            info!("No pending steps, returning the last completed step as the last");
            let mut last = previous[previous.len() - 1].clone();
            last.is_last = true;
            return Ok(last);
        };

        let mut ability = current
            .ability
            .clone()
            .ok_or_else(|| AgentError::MissingAbility {
                step_id: current.step_id.clone(),
            })?;
        info!(
            "Found next step {} ({}) ability: {}",
            current.step_id, current.name, ability.name
        );

        if self.config.review_abilities {
            ability = self.review_ability(task_id, &ability, &previous).await?;
        }

        let finished = ability.name == FINISH_ABILITY;
        let (output, remaining) = if finished {
            info!("Finish task {}", task_id);
            (ability.args.get("reason").and_then(output_to_string), 0)
        } else {
            info!(
                "Run ability {} with arguments {}",
                ability.name,
                serde_json::Value::Object(ability.args.clone())
            );
            let value = self
                .abilities
                .run_ability(task_id, &ability.name, &ability.args)
                .await?;
            let output = output_to_string(&value);
            debug!(
                "Executed step [{}] output:\n{}",
                current.name,
                output.as_deref().unwrap_or_default()
            );
            self.record(TrajectoryEntry::ability_run(
                task_id,
                &current.step_id,
                ability.clone(),
                output.clone().unwrap_or_default(),
            ))
            .await?;

            let remaining = self
                .review_steps(&task, current, &ability, output.as_deref(), &previous, next)
                .await?;
            (output, remaining)
        };

        let is_last = if finished {
            true
        } else if remaining == 0 {
            info!("Task completed: {}", task_id);
            true
        } else if previous.len() > self.config.max_completed_steps {
            info!("Giving up after {} completed steps", previous.len());
            true
        } else {
            false
        };

        let step = self
            .store
            .update_step(
                task_id,
                &current.step_id,
                StepUpdate::completed(output).with_is_last(is_last),
            )
            .await?;
        info!(
            "Step completed: {} input: {}",
            step.step_id,
            preview(&step.input, 19)
        );
        self.record(TrajectoryEntry::step_completed(
            task_id,
            &step.step_id,
            &step.name,
            is_last,
        ))
        .await?;
        Ok(step)
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn agent_type(&self) -> &str {
        "step_agent"
    }
}
