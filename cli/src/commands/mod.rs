//! CLI command implementations

pub mod abilities;
pub mod run;

pub use abilities::abilities_command;
pub use run::{run_command, RunOptions};
