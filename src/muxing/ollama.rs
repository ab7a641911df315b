//! Ollama native chat responses and their normalization to the canonical chunk

use crate::muxing::chunk::{ChatCompletionChunk, Delta, StreamingChoice, Usage};
use crate::muxing::constants::{ollama, CHAT_COMPLETION_CHUNK_OBJECT, STOP_FINISH_REASON};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// One line of an Ollama `/api/chat` stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OllamaChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub message: OllamaMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<Value>>,
}

/// Maps Ollama's chat shape onto the canonical chunk
pub trait OllamaNormalizer: Send + Sync {
    fn normalize_chunk(&self, chunk: OllamaChatResponse) -> ChatCompletionChunk;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOllamaNormalizer;

impl OllamaNormalizer for DefaultOllamaNormalizer {
    fn normalize_chunk(&self, chunk: OllamaChatResponse) -> ChatCompletionChunk {
        let finish_reason = chunk.done.then(|| {
            chunk
                .done_reason
                .clone()
                .unwrap_or_else(|| STOP_FINISH_REASON.to_string())
        });

        let usage = match (chunk.done, chunk.prompt_eval_count, chunk.eval_count) {
            (true, Some(prompt), Some(completion)) => Some(Usage::new(prompt, completion)),
            _ => None,
        };

        ChatCompletionChunk {
            id: Some(format!("{}{}", ollama::CHUNK_ID_PREFIX, Uuid::now_v7())),
            object: Some(CHAT_COMPLETION_CHUNK_OBJECT.to_string()),
            created: chunk.created_at.map(|ts| ts.timestamp()),
            model: chunk.model,
            system_fingerprint: None,
            choices: vec![StreamingChoice {
                index: Some(0),
                delta: Some(Delta {
                    role: Some(chunk.message.role),
                    content: Some(chunk.message.content),
                    tool_calls: chunk.message.tool_calls,
                }),
                finish_reason,
                logprobs: None,
            }],
            usage,
        }
    }
}
