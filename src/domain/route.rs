//! Resolved routing destinations
//!
//! A [`ModelRoute`] is produced by the rule matcher (outside this crate) and
//! consumed read-only by the muxing layer. The [`ProviderType`] it carries drives
//! both URL shaping and chunk-format selection.

use derive_more::Display;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Wire dialect spoken by an upstream provider
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[display("ollama")]
    Ollama,
    #[display("openai")]
    OpenAi,
    #[display("anthropic")]
    Anthropic,
    #[display("llamacpp")]
    LlamaCpp,
    #[display("openrouter")]
    OpenRouter,
}

impl ProviderType {
    pub const ALL: [ProviderType; 5] = [
        ProviderType::Ollama,
        ProviderType::OpenAi,
        ProviderType::Anthropic,
        ProviderType::LlamaCpp,
        ProviderType::OpenRouter,
    ];

    /// Providers whose configured endpoint omits the `/v1` API prefix
    pub fn needs_v1_suffix(&self) -> bool {
        matches!(self, ProviderType::OpenAi | ProviderType::OpenRouter)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown provider type: {0}")]
pub struct UnknownProviderType(pub String);

impl FromStr for ProviderType {
    type Err = UnknownProviderType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderType::Ollama),
            "openai" => Ok(ProviderType::OpenAi),
            "anthropic" => Ok(ProviderType::Anthropic),
            "llamacpp" => Ok(ProviderType::LlamaCpp),
            "openrouter" => Ok(ProviderType::OpenRouter),
            _ => Err(UnknownProviderType(s.to_string())),
        }
    }
}

/// Model name as understood by the destination provider
#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef, TryFrom)
)]
pub struct ModelName(String);

/// Base URL of a provider endpoint, as stored in the routing table
#[nutype(
    sanitize(trim),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef, TryFrom)
)]
pub struct EndpointUrl(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedModel {
    pub name: ModelName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub endpoint: EndpointUrl,
    pub provider_type: ProviderType,
}

/// A resolved (model, endpoint, provider type) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub model: RoutedModel,
    pub endpoint: ProviderEndpoint,
}

impl ModelRoute {
    pub fn new(model: ModelName, endpoint: EndpointUrl, provider_type: ProviderType) -> Self {
        Self {
            model: RoutedModel { name: model },
            endpoint: ProviderEndpoint {
                endpoint,
                provider_type,
            },
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        self.endpoint.provider_type
    }
}
