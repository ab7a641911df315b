//! Persisted records: prompts, outputs and alerts
//!
//! These are created once per exchange by the recording pipeline and never
//! updated afterwards.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Trigger category that raises a real-time notification on top of persistence
pub const CRITICAL_CATEGORY: &str = "critical";

fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Kind of request a prompt carries
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    /// Fill-in-the-middle completion emitted by editors on every keystroke
    #[display("fim")]
    Fim,
    #[display("chat")]
    Chat,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown prompt type: {0}")]
pub struct UnknownPromptType(pub String);

impl FromStr for PromptType {
    type Err = UnknownPromptType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fim" => Ok(PromptType::Fim),
            "chat" => Ok(PromptType::Chat),
            other => Err(UnknownPromptType(other.to_string())),
        }
    }
}

/// A request as received from the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub provider: Option<String>,
    /// Raw request payload, usually JSON
    pub request: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
}

impl Prompt {
    pub fn new(
        provider: impl Into<String>,
        request: impl Into<String>,
        prompt_type: PromptType,
    ) -> Self {
        Self {
            id: generate_id(),
            timestamp: Utc::now(),
            provider: Some(provider.into()),
            request: request.into(),
            prompt_type,
        }
    }

    pub fn is_fim(&self) -> bool {
        self.prompt_type == PromptType::Fim
    }
}

/// A response fragment, or the coalesced response once recorded
///
/// While streaming, `output` holds a single chunk payload. The recorded row
/// holds every fragment payload of the exchange as a JSON list, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: String,
    pub prompt_id: String,
    pub timestamp: DateTime<Utc>,
    pub output: String,
}

impl Output {
    pub fn new(prompt_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            prompt_id: prompt_id.into(),
            timestamp: Utc::now(),
            output: output.into(),
        }
    }

    /// Decode the fragment list of a coalesced output row
    pub fn fragments(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.output)
    }
}

/// A security alert raised while the exchange was processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub prompt_id: String,
    pub code_snippet: Option<String>,
    pub trigger_string: Option<String>,
    pub trigger_type: String,
    pub trigger_category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        prompt_id: impl Into<String>,
        trigger_type: impl Into<String>,
        trigger_category: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            prompt_id: prompt_id.into(),
            code_snippet: None,
            trigger_string: None,
            trigger_type: trigger_type.into(),
            trigger_category: Some(trigger_category.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_trigger_string(mut self, trigger_string: impl Into<String>) -> Self {
        self.trigger_string = Some(trigger_string.into());
        self
    }

    pub fn with_code_snippet(mut self, code_snippet: impl Into<String>) -> Self {
        self.code_snippet = Some(code_snippet.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.trigger_category.as_deref() == Some(CRITICAL_CATEGORY)
    }
}
