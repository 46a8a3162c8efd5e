// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Static metadata for known model ids.
//!
//! Context windows here are the provider-documented defaults; a role's
//! `contextWindow` override (or `llm.default`'s) always wins over this table.

/// Known model ids and their total context window, in tokens.
///
/// Lookup is exact-id first, then longest-prefix, so versioned ids like
/// `gpt-4o-2024-11-20` resolve through their family entry.
static CONTEXT_WINDOWS: &[(&str, u32)] = &[
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-5", 400_000),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    ("claude-opus-4", 200_000),
    ("claude-sonnet-4", 200_000),
    ("claude-haiku-4", 200_000),
    ("claude-3-5", 200_000),
    ("gemini-2.5", 1_048_576),
    ("llama3", 128_000),
    ("mock", 32_000),
];

/// Default context window for a bare model name, when known.
pub fn context_window_for(model_id: &str) -> Option<u32> {
    if let Some((_, w)) = CONTEXT_WINDOWS.iter().find(|(id, _)| *id == model_id) {
        return Some(*w);
    }
    CONTEXT_WINDOWS
        .iter()
        .filter(|(id, _)| model_id.starts_with(id))
        .max_by_key(|(id, _)| id.len())
        .map(|(_, w)| *w)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_id_matches() {
        assert_eq!(context_window_for("gpt-4o"), Some(128_000));
    }

    #[test]
    fn versioned_id_resolves_via_prefix() {
        assert_eq!(context_window_for("gpt-4o-2024-11-20"), Some(128_000));
        assert_eq!(context_window_for("claude-sonnet-4-5"), Some(200_000));
    }

    #[test]
    fn longest_prefix_wins() {
        // "gpt-4o-mini-2024" must match gpt-4o-mini, not gpt-4o.
        assert_eq!(context_window_for("gpt-4o-mini-2024"), Some(128_000));
        let mini = CONTEXT_WINDOWS.iter().find(|(id, _)| *id == "gpt-4o-mini");
        assert!(mini.is_some());
    }

    #[test]
    fn unknown_model_is_none() {
        assert_eq!(context_window_for("totally-unknown-model"), None);
    }
}
