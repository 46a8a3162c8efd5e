// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::LlmError;

/// A parsed `"{provider}/{model}"` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

/// Parse a model spec string.  The format is `{provider}/{model}` with
/// exactly one `/`; anything else is rejected.
pub fn parse_model_spec(spec: &str) -> Result<ModelRef, LlmError> {
    let mut parts = spec.splitn(3, '/');
    let provider = parts.next().unwrap_or_default();
    let model = parts.next().unwrap_or_default();
    if provider.is_empty() || model.is_empty() || parts.next().is_some() {
        return Err(LlmError::InvalidSpec(spec.to_string()));
    }
    Ok(ModelRef {
        provider: provider.to_string(),
        model: model.to_string(),
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_spec_parses() {
        let r = parse_model_spec("openai/gpt-4o").unwrap();
        assert_eq!(r.provider, "openai");
        assert_eq!(r.model, "gpt-4o");
    }

    #[test]
    fn missing_slash_rejects() {
        assert!(matches!(
            parse_model_spec("gpt-4o"),
            Err(LlmError::InvalidSpec(_))
        ));
    }

    #[test]
    fn two_slashes_reject() {
        assert!(parse_model_spec("openai/gpt/4o").is_err());
    }

    #[test]
    fn empty_provider_rejects() {
        assert!(parse_model_spec("/gpt-4o").is_err());
    }

    #[test]
    fn empty_model_rejects() {
        assert!(parse_model_spec("openai/").is_err());
    }

    #[test]
    fn error_message_quotes_the_spec() {
        let err = parse_model_spec("nope").unwrap_err();
        assert_eq!(err.to_string(), "Invalid model spec \"nope\"");
    }
}
