//! Single task execution command

use crate::config::CliConfigLoader;
use crate::output::{format_execution, ConsoleObserver};
use anyhow::{bail, Result};
use codebutler_core::store::TaskRequest;
use codebutler_core::{
    Agent, AbilityRegistry, AgentBuilder, InMemoryStore, LocalWorkspace, SqliteStore, TaskStore,
    TrajectoryRecorder,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Settings for one run taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workspace: PathBuf,
    pub database: Option<PathBuf>,
    pub max_turns: Option<usize>,
    pub trajectory_file: Option<PathBuf>,
    pub prompt_dir: Option<PathBuf>,
    pub step_mode: bool,
}

/// Create a task and run it until a step is flagged last
pub async fn run_command(
    task: String,
    config_loader: CliConfigLoader,
    options: RunOptions,
) -> Result<()> {
    info!("Executing task: {}", task);

    let loaded = config_loader.load()?;
    info!("🤖 Using protocol: {}", loaded.llm.protocol.as_str());
    info!("🤖 Using model: {}", loaded.llm.model);

    let mut agent_config = loaded.agent;
    if let Some(max_turns) = options.max_turns {
        agent_config.max_turns = max_turns;
    }
    if options.prompt_dir.is_some() {
        agent_config.prompt_dir = options.prompt_dir;
    }

    debug!("📁 Workspace: {}", options.workspace.display());
    let workspace = Arc::new(LocalWorkspace::new(options.workspace));
    let abilities = Arc::new(AbilityRegistry::with_builtin(workspace));

    let store: Arc<dyn TaskStore> = match &options.database {
        Some(path) => {
            debug!("🗄️  Database: {}", path.display());
            Arc::new(SqliteStore::open(path)?)
        }
        None => Arc::new(InMemoryStore::new()),
    };

    let mut builder = AgentBuilder::new(loaded.llm)
        .with_agent_config(agent_config)
        .with_store(store)
        .with_abilities(abilities);
    if let Some(trajectory_file) = &options.trajectory_file {
        info!("📊 Trajectory file: {}", trajectory_file.display());
        builder =
            builder.with_trajectory_recorder(Arc::new(TrajectoryRecorder::with_file(trajectory_file)));
    }
    let agent = builder.build()?;

    let task = agent.create_task(TaskRequest::new(task)).await?;
    println!("📝 Task {}", task.task_id);

    let observer = ConsoleObserver::new(options.step_mode);
    let execution = agent.run_task(&task.task_id, &observer).await?;
    println!("{}", format_execution(&execution));

    if !execution.success {
        bail!("Task {} did not complete", task.task_id);
    }
    Ok(())
}
