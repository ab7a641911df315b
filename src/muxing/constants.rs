//! Wire-level constants shared by the muxing formatters
//!
//! Field names and labels that appear in provider payloads live here so the
//! formatters do not scatter string literals.

/// Prefix of a server-sent-event data line
pub const SSE_DATA_PREFIX: &str = "data:";

/// Terminator of a server-sent-event frame
pub const SSE_FRAME_END: &str = "\n\n";

pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const ASSISTANT_ROLE: &str = "assistant";
pub const STOP_FINISH_REASON: &str = "stop";

/// Anthropic event fields
pub mod anthropic {
    pub const TYPE: &str = "type";
    pub const MESSAGE_STOP: &str = "message_stop";
    pub const DELTA: &str = "delta";
    pub const CONTENT_BLOCK: &str = "content_block";
    pub const TEXT: &str = "text";

    /// Model label on synthesized chunks; Anthropic events do not repeat the model
    pub const MUXED_MODEL: &str = "anthropic-muxed-model";
    pub const CHUNK_ID_PREFIX: &str = "anthropic-chat-";
}

/// Ollama chat response labels
pub mod ollama {
    pub const CHUNK_ID_PREFIX: &str = "ollama-chat-";
}

/// Provider path shaping
pub mod paths {
    pub const OPENAI_API_PREFIX: &str = "/v1";
}

/// Request body fields rewritten by the body adapter
pub mod body_fields {
    pub const MODEL: &str = "model";
    pub const BASE_URL: &str = "base_url";
}
