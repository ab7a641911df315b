//! Read-only queries over recorded exchanges

use crate::domain::records::PromptType;
use crate::infrastructure::store::decode_prompt_type;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

const PROMPTS_WITH_OUTPUT: &str = r#"
    SELECT
        p.id, p.timestamp, p.provider, p.request, p.type,
        o.id AS output_id,
        o.output,
        o.timestamp AS output_timestamp
    FROM prompts p
    LEFT JOIN outputs o ON p.id = o.prompt_id
    ORDER BY p.timestamp DESC
"#;

const ALERTS_WITH_PROMPT_AND_OUTPUT: &str = r#"
    SELECT
        a.id, a.prompt_id, a.code_snippet, a.trigger_string, a.trigger_type,
        a.trigger_category, a.timestamp,
        p.timestamp AS prompt_timestamp,
        p.provider,
        p.request,
        p.type,
        o.id AS output_id,
        o.output,
        o.timestamp AS output_timestamp
    FROM alerts a
    INNER JOIN prompts p ON p.id = a.prompt_id
    LEFT JOIN outputs o ON p.id = o.prompt_id
    ORDER BY a.timestamp DESC
"#;

/// A prompt with its recorded output, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptWithOutputRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub provider: Option<String>,
    pub request: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
    pub output_id: Option<String>,
    pub output: Option<String>,
    pub output_timestamp: Option<DateTime<Utc>>,
}

impl PromptWithOutputRow {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            timestamp: row.try_get("timestamp")?,
            provider: row.try_get("provider")?,
            request: row.try_get("request")?,
            prompt_type: decode_prompt_type(row, "type")?,
            output_id: row.try_get("output_id")?,
            output: row.try_get("output")?,
            output_timestamp: row.try_get("output_timestamp")?,
        })
    }
}

/// An alert with the prompt that raised it and that prompt's output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertWithPromptAndOutputRow {
    pub id: String,
    pub prompt_id: String,
    pub code_snippet: Option<String>,
    pub trigger_string: Option<String>,
    pub trigger_type: String,
    pub trigger_category: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub prompt_timestamp: DateTime<Utc>,
    pub provider: Option<String>,
    pub request: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
    pub output_id: Option<String>,
    pub output: Option<String>,
    pub output_timestamp: Option<DateTime<Utc>>,
}

impl AlertWithPromptAndOutputRow {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            prompt_id: row.try_get("prompt_id")?,
            code_snippet: row.try_get("code_snippet")?,
            trigger_string: row.try_get("trigger_string")?,
            trigger_type: row.try_get("trigger_type")?,
            trigger_category: row.try_get("trigger_category")?,
            timestamp: row.try_get("timestamp")?,
            prompt_timestamp: row.try_get("prompt_timestamp")?,
            provider: row.try_get("provider")?,
            request: row.try_get("request")?,
            prompt_type: decode_prompt_type(row, "type")?,
            output_id: row.try_get("output_id")?,
            output: row.try_get("output")?,
            output_timestamp: row.try_get("output_timestamp")?,
        })
    }
}

#[derive(Clone)]
pub struct DbReader {
    pool: SqlitePool,
}

impl DbReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every prompt, newest first, joined with its output
    pub async fn get_prompts_with_output(&self) -> Result<Vec<PromptWithOutputRow>> {
        let rows = sqlx::query(PROMPTS_WITH_OUTPUT)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(PromptWithOutputRow::from_row)
            .collect::<sqlx::Result<_>>()?)
    }

    /// Every alert, newest first, joined with its prompt and output
    pub async fn get_alerts_with_prompt_and_output(
        &self,
    ) -> Result<Vec<AlertWithPromptAndOutputRow>> {
        let rows = sqlx::query(ALERTS_WITH_PROMPT_AND_OUTPUT)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(AlertWithPromptAndOutputRow::from_row)
            .collect::<sqlx::Result<_>>()?)
    }
}
