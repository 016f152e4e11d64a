//! Abilities that read and write the task workspace

use crate::abilities::base::{string_arg, Ability, AbilityContext, AbilityParameter};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct ReadFileAbility;

#[async_trait]
impl Ability for ReadFileAbility {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read data from a file"
    }

    fn category(&self) -> &str {
        "file_system"
    }

    fn parameters(&self) -> Vec<AbilityParameter> {
        vec![AbilityParameter::required(
            "file_path",
            "string",
            "Path to the file",
        )]
    }

    fn output_type(&self) -> &str {
        "string"
    }

    async fn run(&self, ctx: &AbilityContext, args: &Map<String, Value>) -> Result<Value> {
        let path = string_arg(self.name(), args, "file_path")?;
        let bytes = ctx.workspace.read(&ctx.task_id, path).await?;
        Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

pub struct WriteFileAbility;

#[async_trait]
impl Ability for WriteFileAbility {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write data to a file"
    }

    fn category(&self) -> &str {
        "file_system"
    }

    fn parameters(&self) -> Vec<AbilityParameter> {
        vec![
            AbilityParameter::required("file_path", "string", "Path to the file"),
            AbilityParameter::required("data", "string", "Data to write to the file"),
        ]
    }

    fn output_type(&self) -> &str {
        "None"
    }

    async fn run(&self, ctx: &AbilityContext, args: &Map<String, Value>) -> Result<Value> {
        let path = string_arg(self.name(), args, "file_path")?;
        let data = string_arg(self.name(), args, "data")?;
        ctx.workspace
            .write(&ctx.task_id, path, data.as_bytes())
            .await?;
        Ok(Value::String(format!(
            "Wrote {} bytes to {}",
            data.len(),
            path
        )))
    }
}

pub struct ListFilesAbility;

#[async_trait]
impl Ability for ListFilesAbility {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory"
    }

    fn category(&self) -> &str {
        "file_system"
    }

    fn parameters(&self) -> Vec<AbilityParameter> {
        vec![AbilityParameter::required(
            "path",
            "string",
            "Path to the directory",
        )]
    }

    fn output_type(&self) -> &str {
        "list[str]"
    }

    async fn run(&self, ctx: &AbilityContext, args: &Map<String, Value>) -> Result<Value> {
        let path = string_arg(self.name(), args, "path")?;
        let files = ctx.workspace.list(&ctx.task_id, path).await?;
        Ok(Value::from(files))
    }
}
