// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Process-wide settings handle.
//!
//! Settings are initialized once, at agent construction, and read from
//! everywhere else.  Tests call [`reset_global`] between cases so each case
//! can install its own settings without leaking into the next.

use std::sync::{Arc, RwLock};

use crate::{ConfigError, Settings};

static GLOBAL: RwLock<Option<Arc<Settings>>> = RwLock::new(None);

/// Install the process-wide settings.  Fails if already initialized.
pub fn init_global(settings: Settings) -> Result<Arc<Settings>, ConfigError> {
    let mut slot = GLOBAL.write().expect("settings lock poisoned");
    if slot.is_some() {
        return Err(ConfigError::AlreadyInitialized);
    }
    let arc = Arc::new(settings);
    *slot = Some(Arc::clone(&arc));
    Ok(arc)
}

/// The process-wide settings, if initialized.
pub fn global() -> Option<Arc<Settings>> {
    GLOBAL.read().expect("settings lock poisoned").clone()
}

/// Clear the process-wide settings.  Test-only escape hatch.
pub fn reset_global() {
    *GLOBAL.write().expect("settings lock poisoned") = None;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // The global slot is shared across the whole test binary, so these cases
    // run under one test to avoid interleaving with each other.
    #[test]
    fn init_get_reset_cycle() {
        reset_global();
        assert!(global().is_none());

        let installed = init_global(Settings::default()).unwrap();
        let fetched = global().expect("settings should be installed");
        assert!(Arc::ptr_eq(&installed, &fetched));

        // Second init rejects.
        assert!(matches!(
            init_global(Settings::default()),
            Err(ConfigError::AlreadyInitialized)
        ));

        reset_global();
        assert!(global().is_none());

        // After reset, init works again.
        init_global(Settings::default()).unwrap();
        reset_global();
    }
}
