//! Insert-side storage seam for the recording pipeline
//!
//! Every insert uses `RETURNING *` and maps the stored row back into the domain
//! model, so defaulted or normalized column values round-trip.

use crate::domain::records::{Alert, Output, Prompt, PromptType};
use crate::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

const INSERT_PROMPT: &str = r#"
    INSERT INTO prompts (id, timestamp, provider, request, type)
    VALUES (?1, ?2, ?3, ?4, ?5)
    RETURNING *
"#;

const INSERT_OUTPUT: &str = r#"
    INSERT INTO outputs (id, prompt_id, timestamp, output)
    VALUES (?1, ?2, ?3, ?4)
    RETURNING *
"#;

const INSERT_ALERT: &str = r#"
    INSERT INTO alerts (
        id, prompt_id, code_snippet, trigger_string, trigger_type, trigger_category, timestamp
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    RETURNING *
"#;

/// Persists recorded models, returning the stored row when one was written
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_prompt(&self, prompt: &Prompt) -> Result<Option<Prompt>>;

    async fn insert_output(&self, output: &Output) -> Result<Option<Output>>;

    async fn insert_alert(&self, alert: &Alert) -> Result<Option<Alert>>;
}

pub(crate) fn decode_prompt_type(row: &SqliteRow, column: &str) -> sqlx::Result<PromptType> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn prompt_from_row(row: &SqliteRow) -> sqlx::Result<Prompt> {
    Ok(Prompt {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        provider: row.try_get("provider")?,
        request: row.try_get("request")?,
        prompt_type: decode_prompt_type(row, "type")?,
    })
}

pub(crate) fn output_from_row(row: &SqliteRow) -> sqlx::Result<Output> {
    Ok(Output {
        id: row.try_get("id")?,
        prompt_id: row.try_get("prompt_id")?,
        timestamp: row.try_get("timestamp")?,
        output: row.try_get("output")?,
    })
}

pub(crate) fn alert_from_row(row: &SqliteRow) -> sqlx::Result<Alert> {
    Ok(Alert {
        id: row.try_get("id")?,
        prompt_id: row.try_get("prompt_id")?,
        code_snippet: row.try_get("code_snippet")?,
        trigger_string: row.try_get("trigger_string")?,
        trigger_type: row.try_get("trigger_type")?,
        trigger_category: row.try_get("trigger_category")?,
        timestamp: row.try_get("timestamp")?,
    })
}

/// [`RecordStore`] backed by the shared SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_prompt(&self, prompt: &Prompt) -> Result<Option<Prompt>> {
        let row = sqlx::query(INSERT_PROMPT)
            .bind(&prompt.id)
            .bind(prompt.timestamp)
            .bind(&prompt.provider)
            .bind(&prompt.request)
            .bind(prompt.prompt_type.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(prompt_from_row).transpose()?)
    }

    async fn insert_output(&self, output: &Output) -> Result<Option<Output>> {
        let row = sqlx::query(INSERT_OUTPUT)
            .bind(&output.id)
            .bind(&output.prompt_id)
            .bind(output.timestamp)
            .bind(&output.output)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(output_from_row).transpose()?)
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<Option<Alert>> {
        let row = sqlx::query(INSERT_ALERT)
            .bind(&alert.id)
            .bind(&alert.prompt_id)
            .bind(&alert.code_snippet)
            .bind(&alert.trigger_string)
            .bind(&alert.trigger_type)
            .bind(&alert.trigger_category)
            .bind(alert.timestamp)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(alert_from_row).transpose()?)
    }
}
