// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Errors raised by model resolution and model calls.
///
/// Resolution errors (`InvalidSpec`, `ProviderNotFound`,
/// `ProviderRequiresType`) surface at configuration time; call errors
/// (`RateLimited`, `Timeout`, `Api`, `Transport`) surface on the step result
/// of the task that made the call and trigger reflection rather than
/// crashing the loop.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Invalid model spec \"{0}\"")]
    InvalidSpec(String),
    #[error("Provider \"{0}\" not found")]
    ProviderNotFound(String),
    #[error("Provider \"{0}\" requires explicit \"type\"")]
    ProviderRequiresType(String),
    #[error("unsupported provider type \"{0}\"")]
    UnsupportedProviderType(String),
    #[error("{provider} rate limited: {message}")]
    RateLimited { provider: String, message: String },
    #[error("model call timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("{provider} API error {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Short machine-readable kind, used on failure event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSpec(_) => "InvalidSpec",
            Self::ProviderNotFound(_) => "ProviderNotFound",
            Self::ProviderRequiresType(_) => "ProviderRequiresType",
            Self::UnsupportedProviderType(_) => "UnsupportedProviderType",
            Self::RateLimited { .. } => "LLMRateLimitError",
            Self::Timeout { .. } => "LLMTimeoutError",
            Self::Api { .. } | Self::Transport(_) | Self::Other(_) => "LLMError",
        }
    }
}
