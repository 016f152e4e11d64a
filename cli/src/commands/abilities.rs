//! Abilities listing command

use crate::output::format_ability;
use anyhow::Result;
use codebutler_core::{AbilityRegistry, LocalWorkspace};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Show the abilities a task can use
pub fn abilities_command(workspace: &Path) -> Result<()> {
    info!("Listing available abilities");

    let registry = AbilityRegistry::with_builtin(Arc::new(LocalWorkspace::new(workspace)));

    println!("{}\n", "🛠️  Available Abilities".bold());
    for descriptor in registry.list_abilities().values() {
        println!("{}\n", format_ability(descriptor));
    }

    Ok(())
}
