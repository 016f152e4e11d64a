//! Ability registry: lookup, argument checking and dispatch

use super::base::{Ability, AbilityContext, AbilityDescriptor};
use super::builtin::{FinishAbility, ListFilesAbility, ReadFileAbility, WriteFileAbility};
use crate::error::{AbilityError, Result};
use crate::workspace::Workspace;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Registry of the abilities available to an agent
pub struct AbilityRegistry {
    abilities: BTreeMap<String, Arc<dyn Ability>>,
    workspace: Arc<dyn Workspace>,
}

impl AbilityRegistry {
    /// Create an empty registry bound to a workspace
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self {
            abilities: BTreeMap::new(),
            workspace,
        }
    }

    /// Create a registry holding the built-in abilities
    pub fn with_builtin(workspace: Arc<dyn Workspace>) -> Self {
        let mut registry = Self::new(workspace);
        registry.register(Arc::new(FinishAbility));
        registry.register(Arc::new(ReadFileAbility));
        registry.register(Arc::new(WriteFileAbility));
        registry.register(Arc::new(ListFilesAbility));
        registry
    }

    /// Register an ability, replacing any previous one with the same name
    pub fn register(&mut self, ability: Arc<dyn Ability>) {
        self.abilities.insert(ability.name().to_string(), ability);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.abilities.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Ability>> {
        self.abilities.get(name).cloned()
    }

    pub fn workspace(&self) -> Arc<dyn Workspace> {
        Arc::clone(&self.workspace)
    }

    pub fn ability_names(&self) -> Vec<&str> {
        self.abilities.keys().map(|s| s.as_str()).collect()
    }

    pub fn list_abilities(&self) -> BTreeMap<String, AbilityDescriptor> {
        self.abilities
            .iter()
            .map(|(name, ability)| {
                (
                    name.clone(),
                    AbilityDescriptor::from_ability(ability.as_ref()),
                )
            })
            .collect()
    }

    /// One `- name: description. Params: (...) -> type` line per ability
    pub fn list_abilities_for_prompt(&self) -> String {
        self.list_abilities()
            .values()
            .map(|descriptor| format!("- {}", descriptor))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check arguments against the declared parameters of `ability`
    fn check_arguments(ability: &dyn Ability, args: &Map<String, Value>) -> Result<()> {
        let parameters = ability.parameters();

        let missing: Vec<&str> = parameters
            .iter()
            .filter(|p| p.required && args.get(&p.name).map_or(true, Value::is_null))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(AbilityError::InvalidArguments {
                name: ability.name().to_string(),
                message: format!("missing required arguments: {}", missing.join(", ")),
            }
            .into());
        }

        let unexpected: Vec<&str> = args
            .keys()
            .filter(|key| !parameters.iter().any(|p| &p.name == *key))
            .map(|key| key.as_str())
            .collect();
        if !unexpected.is_empty() {
            return Err(AbilityError::InvalidArguments {
                name: ability.name().to_string(),
                message: format!("unexpected arguments: {}", unexpected.join(", ")),
            }
            .into());
        }

        Ok(())
    }

    /// Run an ability for a task
    pub async fn run_ability(
        &self,
        task_id: &str,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<Value> {
        let ability = self.get(name).ok_or_else(|| AbilityError::NotFound {
            name: name.to_string(),
        })?;
        Self::check_arguments(ability.as_ref(), args)?;

        info!("Running ability {} for task {}", name, task_id);
        let ctx = AbilityContext {
            task_id: task_id.to_string(),
            workspace: self.workspace(),
        };

        let start = Instant::now();
        let output = ability.run(&ctx, args).await?;
        debug!(
            "Ability {} finished in {} ms",
            name,
            start.elapsed().as_millis()
        );
        Ok(output)
    }
}
