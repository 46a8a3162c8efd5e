// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Role → model handle resolution with keyed caching.
//!
//! A role (or tier) maps to a `"{provider}/{model}"` spec in settings; the
//! registry resolves the provider to a wire protocol, builds a client, and
//! caches it by `(resolved_provider_type, model, api_type)`.  Two roles that
//! resolve to the same tuple share one handle (identity-equal `Arc`).
//!
//! Credential setters evict exactly the affected provider type's handles:
//! switching codex credentials drops every handle keyed by `codex` while an
//! `openai`-keyed sibling stays cached, identity-preserved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use otto_config::{LlmSettings, ModelSpecValue};
use tracing::debug;

use crate::{
    catalog, parse_model_spec, AnthropicClient, LlmError, MockModelClient, ModelHandle,
    OpenAiCompatClient,
};

/// Provider names whose wire protocol can be inferred without an explicit
/// `type` field in settings.
const KNOWN_PROVIDER_TYPES: &[&str] = &["openai", "anthropic", "codex", "copilot", "mock"];

/// Providers that exist without an entry under `llm.providers` — their
/// endpoint and credentials come from dedicated settings and setters.
const IMPLICIT_PROVIDERS: &[&str] = &["codex", "copilot", "mock"];

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_DEFAULT_BASE: &str = "https://api.anthropic.com";
const COPILOT_DEFAULT_BASE: &str = "https://api.githubcopilot.com";

#[derive(Debug, Clone)]
pub struct CodexCredentials {
    pub access_token: String,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct CodexState {
    creds: CodexCredentials,
    base_url: Option<String>,
}

#[derive(Debug, Clone)]
struct CopilotState {
    token: String,
    base_url: String,
    api_path: String,
}

#[derive(Debug, Clone)]
struct OAuthState {
    creds: OAuthCredentials,
    api_path: String,
    base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider_type: String,
    model: String,
    api_type: Option<String>,
}

pub struct ModelRegistry {
    llm: LlmSettings,
    timeout: Duration,
    cache: Mutex<HashMap<CacheKey, ModelHandle>>,
    /// Per-role handle overrides, installed by tests and by the shell when
    /// it wires a scripted model.  Checked before any settings lookup.
    overrides: Mutex<HashMap<String, ModelHandle>>,
    codex: Mutex<Option<CodexState>>,
    copilot: Mutex<Option<CopilotState>>,
    oauth: Mutex<HashMap<String, OAuthState>>,
}

impl ModelRegistry {
    pub fn new(llm: LlmSettings) -> Self {
        let timeout = Duration::from_secs(llm.timeout);
        Self {
            llm,
            timeout,
            cache: Mutex::new(HashMap::new()),
            overrides: Mutex::new(HashMap::new()),
            codex: Mutex::new(None),
            copilot: Mutex::new(None),
            oauth: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the handle for a role (or tier), falling back to the default
    /// spec when the role has no entry.
    pub fn get(&self, role: &str) -> Result<ModelHandle, LlmError> {
        if let Some(h) = self.overrides.lock().expect("override lock").get(role) {
            return Ok(Arc::clone(h));
        }
        let spec = self.spec_for_role(role).clone();
        self.resolve(&spec)
    }

    /// Install a fixed handle for a role, bypassing settings resolution.
    pub fn set_override(&self, role: impl Into<String>, handle: ModelHandle) {
        self.overrides
            .lock()
            .expect("override lock")
            .insert(role.into(), handle);
    }

    /// Role-scoped context window override, falling through role → default.
    /// `None` means neither carries an override; callers combine this with
    /// the model catalog.
    pub fn context_window(&self, role: &str) -> Option<u32> {
        self.spec_for_role(role)
            .context_window()
            .or_else(|| self.llm.default.context_window())
    }

    /// Context window including the catalog fallback for known model names.
    pub fn effective_context_window(&self, role: &str) -> Option<u32> {
        self.context_window(role).or_else(|| {
            let spec = self.spec_for_role(role);
            parse_model_spec(spec.model())
                .ok()
                .and_then(|r| catalog::context_window_for(&r.model))
        })
    }

    pub fn set_codex_credentials(&self, creds: CodexCredentials, base_url: Option<String>) {
        *self.codex.lock().expect("codex lock") = Some(CodexState { creds, base_url });
        self.evict_provider_type("codex");
    }

    pub fn set_copilot_credentials(
        &self,
        token: impl Into<String>,
        base_url: impl Into<String>,
        api_path: impl Into<String>,
    ) {
        *self.copilot.lock().expect("copilot lock") = Some(CopilotState {
            token: token.into(),
            base_url: base_url.into(),
            api_path: api_path.into(),
        });
        self.evict_provider_type("copilot");
    }

    /// Store OAuth credentials for a named provider and evict every handle
    /// keyed by that provider's resolved type.  Unknown providers error —
    /// credential storage failures propagate to the caller.
    pub fn set_oauth_credentials(
        &self,
        provider: &str,
        creds: OAuthCredentials,
        api_path: impl Into<String>,
        base_url: Option<String>,
    ) -> Result<(), LlmError> {
        let ptype = self.resolve_provider_type(provider)?;
        self.oauth.lock().expect("oauth lock").insert(
            provider.to_string(),
            OAuthState {
                creds,
                api_path: api_path.into(),
                base_url,
            },
        );
        self.evict_provider_type(&ptype);
        Ok(())
    }

    /// Number of live cache entries — observability for tests.
    pub fn cached_handle_count(&self) -> usize {
        self.cache.lock().expect("cache lock").len()
    }

    fn spec_for_role(&self, role: &str) -> &ModelSpecValue {
        self.llm
            .roles
            .get(role)
            .or_else(|| self.llm.tiers.get(role))
            .unwrap_or(&self.llm.default)
    }

    fn resolve(&self, spec: &ModelSpecValue) -> Result<ModelHandle, LlmError> {
        let r = parse_model_spec(spec.model())?;
        let provider_type = self.resolve_provider_type(&r.provider)?;
        let key = CacheKey {
            provider_type: provider_type.clone(),
            model: r.model.clone(),
            api_type: spec.api_type().map(String::from),
        };

        if let Some(hit) = self.cache.lock().expect("cache lock").get(&key) {
            return Ok(Arc::clone(hit));
        }

        let handle = self.build_handle(&r.provider, &provider_type, &r.model)?;
        debug!(
            provider = %r.provider,
            provider_type = %provider_type,
            model = %r.model,
            "built model handle"
        );
        self.cache
            .lock()
            .expect("cache lock")
            .insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    fn resolve_provider_type(&self, name: &str) -> Result<String, LlmError> {
        if let Some(ps) = self.llm.providers.get(name) {
            if let Some(t) = &ps.provider_type {
                return Ok(t.clone());
            }
            if KNOWN_PROVIDER_TYPES.contains(&name) {
                return Ok(name.to_string());
            }
            return Err(LlmError::ProviderRequiresType(name.to_string()));
        }
        if IMPLICIT_PROVIDERS.contains(&name) {
            return Ok(name.to_string());
        }
        Err(LlmError::ProviderNotFound(name.to_string()))
    }

    fn build_handle(
        &self,
        provider: &str,
        provider_type: &str,
        model: &str,
    ) -> Result<ModelHandle, LlmError> {
        let settings = self.llm.providers.get(provider);
        match provider_type {
            "mock" => Ok(Arc::new(MockModelClient)),
            "openai" => {
                // OAuth credentials for this provider take precedence over
                // the static apiKey from settings.
                let oauth = self
                    .oauth
                    .lock()
                    .expect("oauth lock")
                    .get(provider)
                    .cloned();
                if let Some(state) = oauth {
                    let base = state
                        .base_url
                        .or_else(|| settings.and_then(|s| s.base_url.clone()))
                        .unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string());
                    let chat_url =
                        format!("{}{}", base.trim_end_matches('/'), state.api_path);
                    return Ok(Arc::new(OpenAiCompatClient::with_full_chat_url(
                        provider.to_string(),
                        model.to_string(),
                        Some(state.creds.access_token),
                        chat_url,
                        self.timeout,
                    )));
                }
                let base = settings
                    .and_then(|s| s.base_url.clone())
                    .unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string());
                Ok(Arc::new(OpenAiCompatClient::new(
                    provider.to_string(),
                    model.to_string(),
                    settings.and_then(|s| s.api_key.clone()),
                    &base,
                    self.timeout,
                )))
            }
            "anthropic" => {
                let base = settings
                    .and_then(|s| s.base_url.clone())
                    .unwrap_or_else(|| ANTHROPIC_DEFAULT_BASE.to_string());
                Ok(Arc::new(AnthropicClient::new(
                    provider.to_string(),
                    model.to_string(),
                    settings.and_then(|s| s.api_key.clone()),
                    &base,
                    self.timeout,
                )))
            }
            "codex" => {
                let state = self.codex.lock().expect("codex lock").clone();
                let base = state
                    .as_ref()
                    .and_then(|s| s.base_url.clone())
                    .or_else(|| self.llm.codex.base_url.clone())
                    .unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string());
                Ok(Arc::new(OpenAiCompatClient::new(
                    "codex".to_string(),
                    model.to_string(),
                    state.map(|s| s.creds.access_token),
                    &base,
                    self.timeout,
                )))
            }
            "copilot" => {
                let state = self.copilot.lock().expect("copilot lock").clone();
                match state {
                    Some(s) => {
                        let chat_url =
                            format!("{}{}", s.base_url.trim_end_matches('/'), s.api_path);
                        Ok(Arc::new(OpenAiCompatClient::with_full_chat_url(
                            "copilot".to_string(),
                            model.to_string(),
                            Some(s.token),
                            chat_url,
                            self.timeout,
                        )))
                    }
                    None => Ok(Arc::new(OpenAiCompatClient::new(
                        "copilot".to_string(),
                        model.to_string(),
                        None,
                        COPILOT_DEFAULT_BASE,
                        self.timeout,
                    ))),
                }
            }
            other => Err(LlmError::UnsupportedProviderType(other.to_string())),
        }
    }

    fn evict_provider_type(&self, provider_type: &str) {
        let mut cache = self.cache.lock().expect("cache lock");
        let before = cache.len();
        cache.retain(|k, _| k.provider_type != provider_type);
        debug!(
            provider_type,
            evicted = before - cache.len(),
            "evicted model handles"
        );
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
