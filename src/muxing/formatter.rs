//! Per-provider chunk formatters
//!
//! Each formatter turns one raw upstream chunk into a [`FormattedChunk`]. A
//! malformed chunk never fails: formatters fall back to passing the (cleaned)
//! raw text through, so a single bad chunk cannot break the stream.
//!
//! Formatters are looked up in a fixed [`ProviderType`] table owned by
//! [`StreamChunkFormatter`]; adding a provider means registering an entry.

use crate::domain::route::ProviderType;
use crate::muxing::chunk::ChatCompletionChunk;
use crate::muxing::constants::{anthropic, SSE_DATA_PREFIX, STOP_FINISH_REASON};
use crate::muxing::error::{MuxingError, MuxingResult};
use crate::muxing::ollama::{DefaultOllamaNormalizer, OllamaChatResponse, OllamaNormalizer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Result of formatting a single upstream chunk
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedChunk {
    Canonical(ChatCompletionChunk),
    /// Unparseable content forwarded as-is
    Passthrough(String),
    /// Nothing to forward for this chunk
    Empty,
}

impl FormattedChunk {
    /// Serialized payload to frame for the client, `None` when there is nothing to send
    pub fn into_payload(self) -> Option<String> {
        match self {
            FormattedChunk::Canonical(chunk) => match serde_json::to_string(&chunk) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize canonical chunk");
                    None
                }
            },
            FormattedChunk::Passthrough(raw) if raw.is_empty() => None,
            FormattedChunk::Passthrough(raw) => Some(raw),
            FormattedChunk::Empty => None,
        }
    }
}

/// Converts a raw wire chunk of one provider dialect
pub trait ChunkFormatter: Send + Sync {
    fn format(&self, chunk: &str) -> FormattedChunk;
}

/// Payload of the first SSE `data:` line, or the whole chunk when there is none
pub fn strip_sse_prefix(chunk: &str) -> &str {
    chunk
        .lines()
        .map(str::trim_start)
        .find_map(|line| line.strip_prefix(SSE_DATA_PREFIX))
        .unwrap_or(chunk)
        .trim()
}

/// OpenAI-compatible chunks: openai, llamacpp and openrouter
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiFormatter;

impl ChunkFormatter for OpenAiFormatter {
    fn format(&self, chunk: &str) -> FormattedChunk {
        let cleaned = strip_sse_prefix(chunk);
        match serde_json::from_str::<ChatCompletionChunk>(cleaned) {
            Ok(parsed) => FormattedChunk::Canonical(parsed),
            Err(_) => FormattedChunk::Passthrough(cleaned.to_string()),
        }
    }
}

/// Ollama native chat chunks, raw JSON without SSE framing
pub struct OllamaFormatter {
    normalizer: Arc<dyn OllamaNormalizer>,
}

impl OllamaFormatter {
    pub fn new(normalizer: Arc<dyn OllamaNormalizer>) -> Self {
        Self { normalizer }
    }
}

impl Default for OllamaFormatter {
    fn default() -> Self {
        Self::new(Arc::new(DefaultOllamaNormalizer))
    }
}

impl ChunkFormatter for OllamaFormatter {
    fn format(&self, chunk: &str) -> FormattedChunk {
        match serde_json::from_str::<OllamaChatResponse>(chunk) {
            Ok(parsed) => FormattedChunk::Canonical(self.normalizer.normalize_chunk(parsed)),
            Err(_) => FormattedChunk::Passthrough(chunk.to_string()),
        }
    }
}

/// Anthropic messages-API events
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicFormatter;

impl AnthropicFormatter {
    /// `delta` or `content_block` when present as a non-empty object
    fn content_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
        value?.as_object().filter(|object| !object.is_empty())
    }
}

impl ChunkFormatter for AnthropicFormatter {
    fn format(&self, chunk: &str) -> FormattedChunk {
        let cleaned = strip_sse_prefix(chunk);
        let event = match serde_json::from_str::<Value>(cleaned) {
            Ok(event @ Value::Object(_)) => event,
            _ => return FormattedChunk::Passthrough(cleaned.to_string()),
        };

        let is_stop = event.get(anthropic::TYPE).and_then(Value::as_str)
            == Some(anthropic::MESSAGE_STOP);

        // content_block_delta carries content in `delta`, content_block_start in `content_block`
        let content = Self::content_object(event.get(anthropic::DELTA))
            .or_else(|| Self::content_object(event.get(anthropic::CONTENT_BLOCK)));

        let text = match content {
            Some(content) => Some(
                content
                    .get(anthropic::TEXT)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            None if is_stop => None,
            None => return FormattedChunk::Empty,
        };

        FormattedChunk::Canonical(ChatCompletionChunk::assistant_delta(
            format!("{}{}", anthropic::CHUNK_ID_PREFIX, Uuid::now_v7()),
            anthropic::MUXED_MODEL,
            text,
            is_stop.then(|| STOP_FINISH_REASON.to_string()),
        ))
    }
}

/// Provider-type dispatch table for chunk formatters
pub struct StreamChunkFormatter {
    formatters: HashMap<ProviderType, Arc<dyn ChunkFormatter>>,
}

impl StreamChunkFormatter {
    /// Table with the default formatter for every known provider type
    pub fn new() -> Self {
        Self::with_ollama_normalizer(Arc::new(DefaultOllamaNormalizer))
    }

    pub fn with_ollama_normalizer(normalizer: Arc<dyn OllamaNormalizer>) -> Self {
        let openai: Arc<dyn ChunkFormatter> = Arc::new(OpenAiFormatter);
        let mut table = Self::empty();
        table.register(ProviderType::Ollama, Arc::new(OllamaFormatter::new(normalizer)));
        table.register(ProviderType::OpenAi, Arc::clone(&openai));
        table.register(ProviderType::Anthropic, Arc::new(AnthropicFormatter));
        // llama.cpp server emits OpenAI chunks
        table.register(ProviderType::LlamaCpp, Arc::clone(&openai));
        // OpenRouter is an OpenAI dialect
        table.register(ProviderType::OpenRouter, openai);
        table
    }

    /// Table with no formatters registered
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
        }
    }

    pub fn register(&mut self, provider: ProviderType, formatter: Arc<dyn ChunkFormatter>) {
        self.formatters.insert(provider, formatter);
    }

    pub fn supports(&self, provider: ProviderType) -> bool {
        self.formatters.contains_key(&provider)
    }

    /// Format one chunk for the given destination provider
    pub fn format(&self, chunk: &str, provider: ProviderType) -> MuxingResult<FormattedChunk> {
        let formatter = self
            .formatters
            .get(&provider)
            .ok_or(MuxingError::UnsupportedProvider(provider))?;
        Ok(formatter.format(chunk))
    }
}

impl Default for StreamChunkFormatter {
    fn default() -> Self {
        Self::new()
    }
}
