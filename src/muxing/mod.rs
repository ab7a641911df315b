//! Provider muxing: stream normalization and outbound body rewriting
//!
//! Upstream providers each stream in their own wire format. This module turns
//! every one of them into the canonical `data:<chunk>\n\n` SSE stream the client
//! understands, and points outbound bodies at the resolved destination.

pub mod body_adapter;
pub mod chunk;
pub mod constants;
pub mod error;
pub mod formatter;
pub mod ollama;
pub mod response;
pub mod stream_adapter;

pub use body_adapter::BodyAdapter;
pub use chunk::ChatCompletionChunk;
pub use error::{MuxingError, MuxingResult};
pub use formatter::{ChunkFormatter, FormattedChunk, StreamChunkFormatter};
pub use ollama::{DefaultOllamaNormalizer, OllamaNormalizer};
pub use response::{JsonResponse, StreamingResponse, UpstreamResponse};
pub use stream_adapter::ResponseAdapter;
