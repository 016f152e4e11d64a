//! Terminal output for task runs

use async_trait::async_trait;
use codebutler_core::abilities::AbilityDescriptor;
use codebutler_core::{AgentExecution, Step, StepObserver};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

const OUTPUT_PREVIEW_LINES: usize = 12;

/// Prints each step as it completes, with a spinner while the step runs
pub struct ConsoleObserver {
    step_mode: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    /// `step_mode` asks for confirmation before every step after the first
    pub fn new(step_mode: bool) -> Self {
        Self {
            step_mode,
            spinner: Mutex::new(None),
        }
    }

    fn set_spinner(&self, spinner: Option<ProgressBar>) {
        let previous = match self.spinner.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, spinner),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), spinner),
        };
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }
}

#[async_trait]
impl StepObserver for ConsoleObserver {
    async fn step_started(&self, turn: usize) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Running step {}", turn));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.set_spinner(Some(spinner));
    }

    async fn step_finished(&self, step: &Step) -> bool {
        self.set_spinner(None);
        println!("{}", format_step(step));

        if !self.step_mode || step.is_last {
            return true;
        }

        let confirmed = tokio::task::spawn_blocking(|| {
            dialoguer::Confirm::new()
                .with_prompt("Run the next step?")
                .default(true)
                .interact()
        })
        .await;
        match confirmed {
            Ok(Ok(proceed)) => proceed,
            Ok(Err(e)) => {
                warn!("Unable to read confirmation: {}", e);
                false
            }
            Err(e) => {
                warn!("Confirmation prompt failed: {}", e);
                false
            }
        }
    }
}

/// A completed step: header line, then its ability and a preview of the output
pub fn format_step(step: &Step) -> String {
    let mut lines = vec![format!("{} {}", "▶".green().bold(), step.name.bold())];
    if let Some(ability) = &step.ability {
        lines.push(format!(
            "  {} {}",
            ability.name.cyan(),
            serde_json::Value::Object(ability.args.clone())
                .to_string()
                .dimmed()
        ));
    }

    if let Some(output) = step.output.as_deref().filter(|o| !o.trim().is_empty()) {
        let total = output.lines().count();
        for line in output.lines().take(OUTPUT_PREVIEW_LINES) {
            lines.push(format!("  │ {}", line));
        }
        if total > OUTPUT_PREVIEW_LINES {
            lines.push(format!(
                "  │ {}",
                format!("... {} more lines", total - OUTPUT_PREVIEW_LINES).dimmed()
            ));
        }
    }

    if step.is_last {
        lines.push(format!("  {}", "last step".yellow()));
    }
    lines.join("\n")
}

/// Closing summary of a run
pub fn format_execution(execution: &AgentExecution) -> String {
    let status = if execution.success {
        "✅ Task completed".green().bold()
    } else {
        "❌ Task did not complete".red().bold()
    };
    format!(
        "\n{} ({} steps, {:.1}s)\n{}",
        status,
        execution.steps_executed,
        execution.duration_ms as f64 / 1000.0,
        execution.final_result
    )
}

/// One ability per entry: name, description and parameters
pub fn format_ability(descriptor: &AbilityDescriptor) -> String {
    let mut lines = vec![format!(
        "📦 {} {}",
        descriptor.name.bold(),
        format!("[{}]", descriptor.category).dimmed()
    )];
    lines.push(format!("   {}", descriptor.description));
    for parameter in &descriptor.parameters {
        let required = if parameter.required { "" } else { " (optional)" };
        lines.push(format!(
            "   - {}: {}{} {}",
            parameter.name.cyan(),
            parameter.param_type,
            required,
            parameter.description.dimmed()
        ));
    }
    lines.push(format!("   returns {}", descriptor.output_type));
    lines.join("\n")
}
