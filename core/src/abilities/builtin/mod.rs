//! Built-in abilities

pub mod file_system;
pub mod finish;

pub use file_system::{ListFilesAbility, ReadFileAbility, WriteFileAbility};
pub use finish::FinishAbility;
