use crate::domain::route::ProviderType;
use thiserror::Error;

/// Errors raised by the muxing layer
///
/// These signal programmer or configuration mistakes, never transient failures;
/// malformed wire data is recovered inside the formatters instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MuxingError {
    #[error("Provider {0} not supported")]
    UnsupportedProvider(ProviderType),

    #[error("Only streaming responses can be reformatted, got {0}")]
    UnsupportedResponseKind(String),
}

pub type MuxingResult<T> = Result<T, MuxingError>;
