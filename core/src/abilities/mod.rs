//! Abilities: named, parameterised actions a step can invoke

pub mod base;
pub mod builtin;
pub mod registry;

pub use base::{Ability, AbilityContext, AbilityDescriptor, AbilityParameter};
pub use registry::AbilityRegistry;

/// Name of the sentinel ability that ends a task
pub const FINISH_ABILITY: &str = "finish";
