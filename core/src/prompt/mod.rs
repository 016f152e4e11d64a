//! Prompt templates rendered with handlebars
//!
//! Templates are grouped into named sets (`plan-steps`, `review-steps`,
//! `run-ability`, `agent-profile`). The built-in sets are compiled into the
//! binary; a directory laid out as `<dir>/<set>/<name>.hbs` may override or
//! extend them.

use crate::error::{PromptError, Result};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub const PLAN_STEPS: &str = "plan-steps";
pub const REVIEW_STEPS: &str = "review-steps";
pub const RUN_ABILITY: &str = "run-ability";
pub const AGENT_PROFILE: &str = "agent-profile";

/// (set, template name, source)
const BUILTIN_TEMPLATES: &[(&str, &str, &str)] = &[
    (
        PLAN_STEPS,
        "system-prompt",
        include_str!("../../prompts/plan-steps/system-prompt.hbs"),
    ),
    (
        PLAN_STEPS,
        "step-format",
        include_str!("../../prompts/plan-steps/step-format.hbs"),
    ),
    (
        PLAN_STEPS,
        "user-prompt",
        include_str!("../../prompts/plan-steps/user-prompt.hbs"),
    ),
    (
        REVIEW_STEPS,
        "system-prompt",
        include_str!("../../prompts/review-steps/system-prompt.hbs"),
    ),
    (
        REVIEW_STEPS,
        "step-format",
        include_str!("../../prompts/review-steps/step-format.hbs"),
    ),
    (
        REVIEW_STEPS,
        "user-prompt",
        include_str!("../../prompts/review-steps/user-prompt.hbs"),
    ),
    (
        RUN_ABILITY,
        "system-prompt",
        include_str!("../../prompts/run-ability/system-prompt.hbs"),
    ),
    (
        RUN_ABILITY,
        "user-prompt",
        include_str!("../../prompts/run-ability/user-prompt.hbs"),
    ),
    (
        AGENT_PROFILE,
        "system-prompt",
        include_str!("../../prompts/agent-profile/system-prompt.hbs"),
    ),
    (
        AGENT_PROFILE,
        "user-prompt",
        include_str!("../../prompts/agent-profile/user-prompt.hbs"),
    ),
];

/// Renders the templates of one template set
pub struct PromptEngine {
    set: String,
    registry: Handlebars<'static>,
}

impl PromptEngine {
    /// Engine for a built-in template set
    pub fn new(set: &str) -> Result<Self> {
        Self::with_override_dir(set, None)
    }

    /// Engine for a template set, letting `.hbs` files in `<dir>/<set>/`
    /// replace or add templates
    pub fn with_override_dir(set: &str, dir: Option<&Path>) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        for (_, name, source) in BUILTIN_TEMPLATES.iter().filter(|(s, _, _)| *s == set) {
            register(&mut registry, name, source)?;
        }

        if let Some(dir) = dir {
            let set_dir = dir.join(set);
            if set_dir.is_dir() {
                for entry in std::fs::read_dir(&set_dir)? {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("hbs") {
                        continue;
                    }
                    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    let source = std::fs::read_to_string(&path)?;
                    debug!("Loaded prompt override {}", path.display());
                    register(&mut registry, name, &source)?;
                }
            }
        }

        if registry.get_templates().is_empty() {
            return Err(PromptError::UnknownTemplate {
                set: set.to_string(),
                name: "*".to_string(),
            }
            .into());
        }

        Ok(Self {
            set: set.to_string(),
            registry,
        })
    }

    pub fn set(&self) -> &str {
        &self.set
    }

    pub fn has_prompt(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Render a template of this set with the given data
    pub fn load_prompt<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        if !self.registry.has_template(name) {
            return Err(PromptError::UnknownTemplate {
                set: self.set.clone(),
                name: name.to_string(),
            }
            .into());
        }

        self.registry.render(name, data).map_err(|e| {
            PromptError::RenderFailed {
                name: format!("{}/{}", self.set, name),
                message: e.to_string(),
            }
            .into()
        })
    }
}

fn register(registry: &mut Handlebars<'static>, name: &str, source: &str) -> Result<()> {
    registry
        .register_template_string(name, source)
        .map_err(|e| {
            PromptError::InvalidTemplate {
                name: name.to_string(),
                message: e.to_string(),
            }
            .into()
        })
}
