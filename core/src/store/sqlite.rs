//! SQLite-backed task store

use super::{
    AbilityRef, Pagination, Step, StepRequest, StepStatus, StepUpdate, Task, TaskRequest,
    TaskStore, DEFAULT_STEP_NAME,
};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL UNIQUE,
    input TEXT NOT NULL,
    additional_input TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS steps (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    step_id TEXT NOT NULL UNIQUE,
    task_id TEXT NOT NULL REFERENCES tasks(task_id),
    name TEXT NOT NULL,
    input TEXT NOT NULL,
    ability TEXT,
    status TEXT NOT NULL,
    output TEXT,
    is_last INTEGER NOT NULL DEFAULT 0,
    additional_input TEXT,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_steps_task ON steps(task_id, seq);
";

const STEP_COLUMNS: &str = "task_id, step_id, name, input, ability, status, output, is_last, \
                            additional_input, created_at, modified_at";

/// Task store persisted in a SQLite database file
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| "SQLite connection lock poisoned".into())
    }
}

fn to_json_column<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        task_id: row.get(0)?,
        input: row.get(1)?,
        additional_input: json_column(row, 2)?,
        created_at: time_column(row, 3)?,
    })
}

fn row_to_step(row: &Row) -> rusqlite::Result<Step> {
    let status: String = row.get(5)?;
    let status = status
        .parse::<StepStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let ability: Option<AbilityRef> = json_column(row, 4)?;

    Ok(Step {
        task_id: row.get(0)?,
        step_id: row.get(1)?,
        name: row.get(2)?,
        input: row.get(3)?,
        ability,
        status,
        output: row.get(6)?,
        is_last: row.get(7)?,
        additional_input: json_column(row, 8)?,
        created_at: time_column(row, 9)?,
        modified_at: time_column(row, 10)?,
    })
}

fn count(conn: &Connection, sql: &str, param: Option<&str>) -> Result<usize> {
    let total: i64 = match param {
        Some(value) => conn.query_row(sql, [value], |row| row.get(0))?,
        None => conn.query_row(sql, [], |row| row.get(0))?,
    };
    Ok(total as usize)
}

fn fetch_step(conn: &Connection, task_id: &str, step_id: &str) -> Result<Step> {
    conn.query_row(
        &format!("SELECT {STEP_COLUMNS} FROM steps WHERE task_id = ?1 AND step_id = ?2"),
        params![task_id, step_id],
        row_to_step,
    )
    .optional()?
    .ok_or_else(|| {
        StoreError::StepNotFound {
            task_id: task_id.to_string(),
            step_id: step_id.to_string(),
        }
        .into()
    })
}

fn ensure_task(conn: &Connection, task_id: &str) -> Result<()> {
    if count(conn, "SELECT COUNT(*) FROM tasks WHERE task_id = ?1", Some(task_id))? == 0 {
        return Err(StoreError::TaskNotFound {
            task_id: task_id.to_string(),
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create_task(&self, request: TaskRequest) -> Result<Task> {
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            input: request.input,
            additional_input: request.additional_input,
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (task_id, input, additional_input, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                task.task_id,
                task.input,
                to_json_column(&task.additional_input)?,
                task.created_at.to_rfc3339()
            ],
        )?;
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT task_id, input, additional_input, created_at FROM tasks WHERE task_id = ?1",
            [task_id],
            row_to_task,
        )
        .optional()?
        .ok_or_else(|| {
            StoreError::TaskNotFound {
                task_id: task_id.to_string(),
            }
            .into()
        })
    }

    async fn list_tasks(&self, page: usize, per_page: usize) -> Result<(Vec<Task>, Pagination)> {
        let conn = self.lock()?;
        let pagination = Pagination::new(
            count(&conn, "SELECT COUNT(*) FROM tasks", None)?,
            page,
            per_page,
        );

        let mut stmt = conn.prepare(
            "SELECT task_id, input, additional_input, created_at FROM tasks \
             ORDER BY seq LIMIT ?1 OFFSET ?2",
        )?;
        let tasks = stmt
            .query_map(
                params![pagination.page_size as i64, pagination.offset() as i64],
                row_to_task,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((tasks, pagination))
    }

    async fn create_step(
        &self,
        task_id: &str,
        request: StepRequest,
        is_last: bool,
    ) -> Result<Step> {
        let conn = self.lock()?;
        ensure_task(&conn, task_id)?;

        let now = Utc::now();
        let step = Step {
            task_id: task_id.to_string(),
            step_id: Uuid::new_v4().to_string(),
            name: request.name.unwrap_or_else(|| DEFAULT_STEP_NAME.to_string()),
            input: request.input.unwrap_or_default(),
            ability: request.ability,
            status: StepStatus::Created,
            output: None,
            is_last,
            additional_input: request.additional_input,
            created_at: now,
            modified_at: now,
        };

        conn.execute(
            &format!(
                "INSERT INTO steps ({STEP_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                step.task_id,
                step.step_id,
                step.name,
                step.input,
                to_json_column(&step.ability)?,
                step.status.as_str(),
                step.output,
                step.is_last,
                to_json_column(&step.additional_input)?,
                step.created_at.to_rfc3339(),
                step.modified_at.to_rfc3339()
            ],
        )?;
        Ok(step)
    }

    async fn get_step(&self, task_id: &str, step_id: &str) -> Result<Step> {
        let conn = self.lock()?;
        fetch_step(&conn, task_id, step_id)
    }

    async fn list_steps(
        &self,
        task_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Step>, Pagination)> {
        let conn = self.lock()?;
        ensure_task(&conn, task_id)?;

        let pagination = Pagination::new(
            count(
                &conn,
                "SELECT COUNT(*) FROM steps WHERE task_id = ?1",
                Some(task_id),
            )?,
            page,
            per_page,
        );

        let mut stmt = conn.prepare(&format!(
            "SELECT {STEP_COLUMNS} FROM steps WHERE task_id = ?1 ORDER BY seq LIMIT ?2 OFFSET ?3"
        ))?;
        let steps = stmt
            .query_map(
                params![
                    task_id,
                    pagination.page_size as i64,
                    pagination.offset() as i64
                ],
                row_to_step,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((steps, pagination))
    }

    async fn update_step(
        &self,
        task_id: &str,
        step_id: &str,
        update: StepUpdate,
    ) -> Result<Step> {
        let conn = self.lock()?;
        let current = fetch_step(&conn, task_id, step_id)?;
        if current.status.is_final() {
            return Err(StoreError::StepFinalized {
                step_id: step_id.to_string(),
            }
            .into());
        }

        conn.execute(
            "UPDATE steps SET status = ?1, output = COALESCE(?2, output), \
             is_last = COALESCE(?3, is_last), modified_at = ?4 \
             WHERE task_id = ?5 AND step_id = ?6",
            params![
                update.status.as_str(),
                update.output,
                update.is_last,
                Utc::now().to_rfc3339(),
                task_id,
                step_id
            ],
        )?;
        fetch_step(&conn, task_id, step_id)
    }
}
