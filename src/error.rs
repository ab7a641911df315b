use crate::muxing::MuxingError;
use std::path::PathBuf;
use thiserror::Error;

/// Switchyard application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema file not found at {}", path.display())]
    SchemaNotFound { path: PathBuf },

    #[error("Database not initialized: call init() before use")]
    NotInitialized,

    #[error("Muxing error: {0}")]
    Muxing(#[from] MuxingError),
}

impl Error {
    pub fn schema_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SchemaNotFound { path: path.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
