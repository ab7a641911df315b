//! Switchyard - an LLM traffic gateway core
//!
//! Normalizes streamed responses from Ollama, OpenAI-compatible and Anthropic
//! upstreams into one SSE chunk format, and records every prompt, response and
//! security alert of an exchange into a local SQLite store.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod muxing;

pub use application::Application;
pub use error::{Error, Result};
