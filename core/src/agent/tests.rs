use super::{
    Agent, AgentBuilder, AgentConfig, NullObserver, StepAgent, StepObserver, PLAN_STEP_INPUT,
    PLAN_STEP_NAME,
};
use crate::abilities::AbilityRegistry;
use crate::error::{AgentError, Error, LlmError, Result, StoreError, WorkspaceError};
use crate::llm::{ChatOptions, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageRole};
use crate::store::{
    list_all_steps, AbilityRef, InMemoryStore, Pagination, Step, StepRequest, StepStatus,
    StepUpdate, Task, TaskRequest, TaskStore,
};
use crate::trajectory::{EntryType, TrajectoryRecorder};
use crate::workspace::{LocalWorkspace, Workspace};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

enum Reply {
    Text(String),
    NetworkError,
}

struct ScriptedLlm {
    replies: Mutex<Vec<Reply>>,
    requests: Mutex<Vec<Vec<LlmMessage>>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn requests(&self) -> Vec<Vec<LlmMessage>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        _options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        self.requests.lock().await.push(messages);
        let mut replies = self.replies.lock().await;
        if replies.is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        match replies.remove(0) {
            Reply::Text(content) => Ok(LlmResponse {
                message: LlmMessage::assistant(content),
                usage: None,
                model: "scripted".to_string(),
                finish_reason: Some(FinishReason::Stop),
            }),
            Reply::NetworkError => Err(LlmError::Network {
                message: "connection reset".to_string(),
            }
            .into()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "test"
    }
}

fn text(value: Value) -> Reply {
    Reply::Text(value.to_string())
}

fn plan(steps: Value) -> Reply {
    text(json!({
        "thoughts": {"reasoning": "small steps", "text": "Plan ready"},
        "steps": steps
    }))
}

fn keep_steps() -> Reply {
    text(json!({"thoughts": {"text": "Looks good"}, "steps": []}))
}

fn write_step(name: &str, file: &str, data: &str) -> Value {
    json!({
        "name": name,
        "description": format!("write {}", file),
        "ability": {"name": "write_file", "args": {"file_path": file, "data": data}}
    })
}

fn finish_step(reason: &str) -> Value {
    json!({
        "name": "Finish",
        "description": "wrap up",
        "ability": {"name": "finish", "args": {"reason": reason}}
    })
}

fn no_review() -> AgentConfig {
    AgentConfig {
        review_abilities: false,
        ..Default::default()
    }
}

struct Harness {
    agent: StepAgent,
    llm: Arc<ScriptedLlm>,
    store: Arc<InMemoryStore>,
    workspace: Arc<LocalWorkspace>,
    _dir: TempDir,
}

fn harness(replies: Vec<Reply>, config: AgentConfig) -> Harness {
    harness_with(replies, config, true)
}

fn harness_with(replies: Vec<Reply>, config: AgentConfig, builtin_abilities: bool) -> Harness {
    let dir = TempDir::new().unwrap();
    let workspace = Arc::new(LocalWorkspace::new(dir.path()));
    let abilities = if builtin_abilities {
        AbilityRegistry::with_builtin(workspace.clone())
    } else {
        AbilityRegistry::new(workspace.clone())
    };
    let llm = ScriptedLlm::new(replies);
    let store = Arc::new(InMemoryStore::new());

    let agent = AgentBuilder::with_client(llm.clone())
        .with_agent_config(config)
        .with_store(store.clone())
        .with_abilities(Arc::new(abilities))
        .build()
        .unwrap();

    Harness {
        agent,
        llm,
        store,
        workspace,
        _dir: dir,
    }
}

impl Harness {
    async fn new_task(&self, input: &str) -> String {
        self.agent
            .create_task(TaskRequest::new(input))
            .await
            .unwrap()
            .task_id
    }

    async fn steps(&self, task_id: &str) -> Vec<Step> {
        list_all_steps(self.store.as_ref(), task_id, 100)
            .await
            .unwrap()
    }
}

fn statuses(steps: &[Step]) -> Vec<(String, StepStatus)> {
    steps.iter().map(|s| (s.name.clone(), s.status)).collect()
}

#[tokio::test]
async fn test_first_call_plans_the_task() {
    let h = harness(
        vec![plan(json!([
            write_step("Write", "hello.txt", "hi"),
            finish_step("done")
        ]))],
        no_review(),
    );
    let task_id = h.new_task("Write hello.txt containing 'hi'").await;

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    assert_eq!(step.name, PLAN_STEP_NAME);
    assert_eq!(step.input, PLAN_STEP_INPUT);
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.output.as_deref(), Some("Plan ready"));
    assert!(!step.is_last);

    let steps = h.steps(&task_id).await;
    assert_eq!(
        statuses(&steps),
        vec![
            (PLAN_STEP_NAME.to_string(), StepStatus::Completed),
            ("Write".to_string(), StepStatus::Created),
            ("Finish".to_string(), StepStatus::Created),
        ]
    );
    assert_eq!(steps[1].ability.as_ref().unwrap().name, "write_file");

    let requests = h.llm.requests().await;
    assert_eq!(requests.len(), 1);
    let roles: Vec<MessageRole> = requests[0].iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::System, MessageRole::System, MessageRole::User]
    );
    assert!(requests[0][0].content.contains("- write_file: "));
    assert!(requests[0][2].content.contains("Write hello.txt containing 'hi'"));
}

#[tokio::test]
async fn test_plan_uses_request_input_for_the_placeholder() {
    let h = harness(vec![plan(json!([finish_step("done")]))], no_review());
    let task_id = h.new_task("anything").await;

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::new("ignored", "Plan carefully"))
        .await
        .unwrap();
    assert_eq!(step.name, PLAN_STEP_NAME);
    assert_eq!(step.input, "Plan carefully");
}

#[tokio::test]
async fn test_invalid_json_gets_corrective_message() {
    let h = harness(
        vec![
            Reply::Text("I think you should write a file".to_string()),
            plan(json!([finish_step("done")])),
        ],
        no_review(),
    );
    let task_id = h.new_task("goal").await;

    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let requests = h.llm.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].len(), requests[0].len() + 1);
    assert_eq!(&requests[1][..3], &requests[0][..]);

    let corrective = &requests[1][3];
    assert_eq!(corrective.role, MessageRole::User);
    assert!(corrective.content.starts_with("Invalid response. "));
    assert!(corrective.content.ends_with(". Please try again."));
}

#[tokio::test]
async fn test_persistent_invalid_json_exhausts_the_retries() {
    let prose = || Reply::Text("I think you should write a file".to_string());
    let h = harness(
        vec![prose(), prose(), prose(), plan(json!([finish_step("done")]))],
        no_review(),
    );
    let task_id = h.new_task("goal").await;

    let err = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Agent(AgentError::RetryLimitExceeded { attempts: 3, .. })
    ));

    let requests = h.llm.requests().await;
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].len(), 5);
    for corrective in &requests[2][3..] {
        assert_eq!(corrective.role, MessageRole::User);
        assert!(corrective.content.starts_with("Invalid response. "));
    }
}

#[tokio::test]
async fn test_empty_plan_is_rejected() {
    let h = harness(
        vec![
            text(json!({"thoughts": {"text": "nothing to do"}, "steps": []})),
            text(json!({"thoughts": {"text": "nothing to do"}})),
            plan(json!([finish_step("done")])),
        ],
        no_review(),
    );
    let task_id = h.new_task("goal").await;

    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let requests = h.llm.requests().await;
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[1].last().unwrap().content,
        "You must provide at least one step."
    );
    assert_eq!(requests[2].len(), 5);

    let steps = h.steps(&task_id).await;
    assert_eq!(steps.len(), 2);
}

#[tokio::test]
async fn test_invalid_ability_resends_history_unchanged() {
    let h = harness(
        vec![
            plan(json!([{"name": "Launch", "description": "go", "ability": {"name": "launch_rocket"}}])),
            plan(json!([finish_step("done")])),
        ],
        no_review(),
    );
    let task_id = h.new_task("goal").await;

    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let requests = h.llm.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_plan_without_abilities_fails_after_retry_bound() {
    let reply = || plan(json!([write_step("Write", "hello.txt", "hi")]));
    let h = harness_with(vec![reply(), reply(), reply(), reply()], no_review(), false);
    let task_id = h.new_task("Write hello.txt containing 'hi'").await;

    let err = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Agent(AgentError::RetryLimitExceeded { attempts: 3, .. })
    ));
    assert!(err.to_string().contains("Failed to create steps"));
    assert_eq!(h.llm.requests().await.len(), 3);

    let steps = h.steps(&task_id).await;
    assert_eq!(
        statuses(&steps),
        vec![(PLAN_STEP_NAME.to_string(), StepStatus::Skipped)]
    );
}

#[tokio::test]
async fn test_transport_errors_are_not_retried() {
    let h = harness(
        vec![Reply::NetworkError, plan(json!([finish_step("done")]))],
        no_review(),
    );
    let task_id = h.new_task("goal").await;

    let err = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Llm(LlmError::Network { .. })));
    assert_eq!(h.llm.requests().await.len(), 1);

    // the failed placeholder was skipped, so the next call plans again
    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(step.name, PLAN_STEP_NAME);
    assert_eq!(step.status, StepStatus::Completed);
}

/// Accepts reads and creates but refuses every update
struct FrozenStore(InMemoryStore);

#[async_trait]
impl TaskStore for FrozenStore {
    async fn create_task(&self, request: TaskRequest) -> Result<Task> {
        self.0.create_task(request).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.0.get_task(task_id).await
    }

    async fn list_tasks(&self, page: usize, per_page: usize) -> Result<(Vec<Task>, Pagination)> {
        self.0.list_tasks(page, per_page).await
    }

    async fn create_step(
        &self,
        task_id: &str,
        request: StepRequest,
        is_last: bool,
    ) -> Result<Step> {
        self.0.create_step(task_id, request, is_last).await
    }

    async fn get_step(&self, task_id: &str, step_id: &str) -> Result<Step> {
        self.0.get_step(task_id, step_id).await
    }

    async fn list_steps(
        &self,
        task_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Step>, Pagination)> {
        self.0.list_steps(task_id, page, per_page).await
    }

    async fn update_step(
        &self,
        _task_id: &str,
        step_id: &str,
        _update: StepUpdate,
    ) -> Result<Step> {
        Err(StoreError::StepFinalized {
            step_id: step_id.to_string(),
        }
        .into())
    }
}

#[tokio::test]
async fn test_planning_error_survives_a_failed_cleanup() {
    let dir = TempDir::new().unwrap();
    let workspace = Arc::new(LocalWorkspace::new(dir.path()));
    let llm = ScriptedLlm::new(vec![Reply::NetworkError]);
    let agent = AgentBuilder::with_client(llm.clone())
        .with_agent_config(no_review())
        .with_store(Arc::new(FrozenStore(InMemoryStore::new())))
        .with_abilities(Arc::new(AbilityRegistry::with_builtin(workspace)))
        .build()
        .unwrap();
    let task_id = agent
        .create_task(TaskRequest::new("goal"))
        .await
        .unwrap()
        .task_id;

    let err = agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Llm(LlmError::Network { .. })));
}

#[tokio::test]
async fn test_executes_ability_and_finishes_when_nothing_is_pending() {
    let h = harness(
        vec![
            plan(json!([write_step("Write", "hello.txt", "hi")])),
            keep_steps(),
        ],
        no_review(),
    );
    let task_id = h.new_task("Write hello.txt containing 'hi'").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    assert_eq!(step.name, "Write");
    assert_eq!(step.status, StepStatus::Completed);
    assert!(step.is_last);
    assert_eq!(
        h.workspace.read(&task_id, "hello.txt").await.unwrap(),
        b"hi"
    );

    let review = h.llm.requests().await.pop().unwrap();
    assert!(review[2].content.contains("There are no remaining steps."));

    // no pending steps left: the last completed step comes back flagged last
    let again = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(again.step_id, step.step_id);
    assert!(again.is_last);
    assert_eq!(h.llm.requests().await.len(), 2);
}

#[tokio::test]
async fn test_replan_skips_every_pending_step() {
    let h = harness(
        vec![
            plan(json!([
                write_step("A", "a.txt", "a"),
                write_step("B", "b.txt", "b"),
                write_step("C", "c.txt", "c")
            ])),
            plan(json!([write_step("X", "x.txt", "x"), finish_step("done")])),
        ],
        no_review(),
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(step.name, "A");
    assert!(!step.is_last);

    let review = h.llm.requests().await.pop().unwrap();
    assert!(review[2].content.contains("The remaining steps are:"));
    assert!(review[2].content.contains("b.txt"));

    let steps = h.steps(&task_id).await;
    assert_eq!(
        statuses(&steps),
        vec![
            (PLAN_STEP_NAME.to_string(), StepStatus::Completed),
            ("A".to_string(), StepStatus::Completed),
            ("B".to_string(), StepStatus::Skipped),
            ("C".to_string(), StepStatus::Skipped),
            ("X".to_string(), StepStatus::Created),
            ("Finish".to_string(), StepStatus::Created),
        ]
    );
}

#[tokio::test]
async fn test_completed_steps_never_change() {
    let h = harness(
        vec![
            plan(json!([
                write_step("A", "a.txt", "a"),
                write_step("B", "b.txt", "b")
            ])),
            plan(json!([write_step("C", "c.txt", "c")])),
            keep_steps(),
        ],
        no_review(),
    );
    let task_id = h.new_task("goal").await;
    for _ in 0..2 {
        h.agent
            .execute_step(&task_id, StepRequest::default())
            .await
            .unwrap();
    }
    let first = h.steps(&task_id).await[1].clone();
    assert_eq!(first.status, StepStatus::Completed);

    let last = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(last.name, "C");
    assert!(last.is_last);

    let after = h.store.get_step(&task_id, &first.step_id).await.unwrap();
    assert_eq!(after.status, StepStatus::Completed);
    assert_eq!(after.output, first.output);
    assert_eq!(after.modified_at, first.modified_at);
}

#[tokio::test]
async fn test_too_many_completed_steps_forces_the_last_step() {
    let h = harness(vec![keep_steps()], no_review());
    let task_id = h.new_task("goal").await;

    let ability = AbilityRef::new(
        "write_file",
        json!({"file_path": "n.txt", "data": "n"})
            .as_object()
            .cloned()
            .unwrap(),
    );
    for i in 0..16 {
        let step = h
            .store
            .create_step(
                &task_id,
                StepRequest::new(format!("done {i}"), "old".to_string())
                    .with_ability(ability.clone()),
                false,
            )
            .await
            .unwrap();
        h.store
            .update_step(&task_id, &step.step_id, StepUpdate::completed(None))
            .await
            .unwrap();
    }
    for name in ["next", "after"] {
        h.store
            .create_step(
                &task_id,
                StepRequest::new(name, "pending").with_ability(ability.clone()),
                false,
            )
            .await
            .unwrap();
    }

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(step.name, "next");
    assert!(step.is_last);

    let pending = h
        .steps(&task_id)
        .await
        .into_iter()
        .filter(|s| s.status == StepStatus::Created)
        .count();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_completed_steps_at_the_limit_do_not_force_the_last_step() {
    let h = harness(vec![keep_steps()], no_review());
    let task_id = h.new_task("goal").await;

    let ability = AbilityRef::new(
        "write_file",
        json!({"file_path": "n.txt", "data": "n"})
            .as_object()
            .cloned()
            .unwrap(),
    );
    for i in 0..AgentConfig::default().max_completed_steps {
        let step = h
            .store
            .create_step(
                &task_id,
                StepRequest::new(format!("done {i}"), "old".to_string())
                    .with_ability(ability.clone()),
                false,
            )
            .await
            .unwrap();
        h.store
            .update_step(&task_id, &step.step_id, StepUpdate::completed(None))
            .await
            .unwrap();
    }
    for name in ["next", "after"] {
        h.store
            .create_step(
                &task_id,
                StepRequest::new(name, "pending").with_ability(ability.clone()),
                false,
            )
            .await
            .unwrap();
    }

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(step.name, "next");
    assert!(!step.is_last);
}

#[tokio::test]
async fn test_finish_ability_ends_the_task_without_review() {
    let h = harness(
        vec![plan(json!([finish_step("all goals met"), write_step("W", "w.txt", "w")]))],
        no_review(),
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let step = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    assert_eq!(step.name, "Finish");
    assert!(step.is_last);
    assert_eq!(step.output.as_deref(), Some("all goals met"));
    assert_eq!(h.llm.requests().await.len(), 1);
}

#[tokio::test]
async fn test_ability_errors_propagate_and_leave_the_step_pending() {
    let h = harness(
        vec![plan(json!([{
            "name": "Read",
            "description": "read a missing file",
            "ability": {"name": "read_file", "args": {"file_path": "missing.txt"}}
        }]))],
        no_review(),
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let err = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Workspace(WorkspaceError::FileNotFound { .. })
    ));

    let steps = h.steps(&task_id).await;
    assert_eq!(steps[1].status, StepStatus::Created);
}

#[tokio::test]
async fn test_review_failure_has_no_retries() {
    let h = harness(
        vec![
            plan(json!([
                write_step("A", "a.txt", "a"),
                write_step("B", "b.txt", "b")
            ])),
            Reply::Text("not json".to_string()),
        ],
        no_review(),
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let err = h
        .agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Agent(AgentError::RetryLimitExceeded { attempts: 1, .. })
    ));
    assert_eq!(h.llm.requests().await.len(), 2);
    assert_eq!(h.steps(&task_id).await[1].status, StepStatus::Created);
}

#[tokio::test]
async fn test_reviewed_ability_replaces_the_planned_one() {
    let h = harness(
        vec![
            plan(json!([write_step("Write", "a.txt", "draft")])),
            text(json!({"name": "write_file", "args": {"file_path": "b.txt", "data": "final"}})),
            keep_steps(),
        ],
        AgentConfig::default(),
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    assert_eq!(h.workspace.read(&task_id, "b.txt").await.unwrap(), b"final");
    assert!(!h.workspace.exists(&task_id, "a.txt").await.unwrap());

    let requests = h.llm.requests().await;
    assert_eq!(requests[1].len(), 2);
    assert!(requests[1][1].content.contains("\"a.txt\""));
}

#[tokio::test]
async fn test_invalid_ability_suggestion_keeps_the_original() {
    let h = harness(
        vec![
            plan(json!([write_step("Write", "a.txt", "draft")])),
            text(json!({"name": "launch_rocket", "args": {}})),
            keep_steps(),
        ],
        AgentConfig::default(),
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    assert_eq!(h.workspace.read(&task_id, "a.txt").await.unwrap(), b"draft");
}

#[tokio::test]
async fn test_profile_role_reaches_the_plan_prompt() {
    let h = harness(
        vec![
            text(json!({"role": "a meticulous archivist", "description": "Keeps tidy files."})),
            plan(json!([finish_step("done")])),
        ],
        AgentConfig {
            generate_profile: true,
            ..no_review()
        },
    );
    let task_id = h.new_task("goal").await;
    h.agent
        .execute_step(&task_id, StepRequest::default())
        .await
        .unwrap();

    let requests = h.llm.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[1][0]
        .content
        .contains("You are a meticulous archivist. Keeps tidy files."));
}

#[tokio::test]
async fn test_run_task_drives_the_task_to_completion() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(TrajectoryRecorder::with_file(dir.path().join("run.json")));
    let workspace_dir = TempDir::new().unwrap();
    let workspace = Arc::new(LocalWorkspace::new(workspace_dir.path()));
    let llm = ScriptedLlm::new(vec![
        plan(json!([
            write_step("Write", "hello.txt", "hi"),
            finish_step("hello.txt written")
        ])),
        keep_steps(),
    ]);

    let agent = AgentBuilder::with_client(llm.clone())
        .with_agent_config(no_review())
        .with_abilities(Arc::new(AbilityRegistry::with_builtin(workspace.clone())))
        .with_trajectory_recorder(recorder.clone())
        .build()
        .unwrap();

    let task = agent
        .create_task(TaskRequest::new("Write hello.txt containing 'hi'"))
        .await
        .unwrap();
    let execution = agent.run_task(&task.task_id, &NullObserver).await.unwrap();

    assert!(execution.success);
    assert_eq!(execution.steps_executed, 3);
    assert_eq!(execution.final_result, "hello.txt written");
    assert_eq!(
        workspace.read(&task.task_id, "hello.txt").await.unwrap(),
        b"hi"
    );

    let entries = recorder.get_entries().await;
    assert!(matches!(
        entries.first().map(|e| &e.entry_type),
        Some(EntryType::TaskStart { .. })
    ));
    assert!(matches!(
        entries.last().map(|e| &e.entry_type),
        Some(EntryType::TaskComplete { success: true, .. })
    ));
    assert!(entries
        .iter()
        .any(|e| matches!(e.entry_type, EntryType::AbilityRun { .. })));
}

struct StopAfterFirst;

#[async_trait]
impl StepObserver for StopAfterFirst {
    async fn step_finished(&self, _step: &Step) -> bool {
        false
    }
}

#[tokio::test]
async fn test_observer_can_stop_a_run() {
    let h = harness(
        vec![plan(json!([write_step("Write", "hello.txt", "hi")]))],
        no_review(),
    );
    let task_id = h.new_task("goal").await;

    let execution = h.agent.run_task(&task_id, &StopAfterFirst).await.unwrap();
    assert!(!execution.success);
    assert_eq!(execution.steps_executed, 1);
}

#[tokio::test]
async fn test_run_task_respects_max_turns() {
    let h = harness(
        vec![
            plan(json!([
                write_step("A", "a.txt", "a"),
                write_step("B", "b.txt", "b"),
                write_step("C", "c.txt", "c")
            ])),
            keep_steps(),
        ],
        AgentConfig {
            max_turns: 2,
            ..no_review()
        },
    );
    let task_id = h.new_task("goal").await;

    let execution = h.agent.run_task(&task_id, &NullObserver).await.unwrap();
    assert!(!execution.success);
    assert_eq!(execution.steps_executed, 2);
    assert!(execution.final_result.contains("Maximum turns exceeded: 2"));
}
