//! Domain types for Switchyard
//!
//! Routes that select an upstream, the records a finished exchange leaves
//! behind, and the context that carries them to the recorder.

pub mod context;
pub mod records;
pub mod route;

pub use context::PipelineContext;
pub use records::{Alert, Output, Prompt, PromptType};
pub use route::{ModelRoute, ProviderEndpoint, ProviderType, RoutedModel};
