// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::{load_skill_dir, SkillFile};

/// Where a skill came from.  User skills always shadow builtin ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSource {
    Builtin,
    User,
}

#[derive(Debug, Clone)]
pub struct RegisteredSkill {
    pub skill: SkillFile,
    pub source: SkillSource,
}

/// Named skill catalog with user-wins precedence.
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, RegisteredSkill>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill.  Registration order does not matter: a `user`
    /// skill replaces a `builtin` of the same name, and a `builtin` never
    /// replaces a `user`.
    pub fn register(&mut self, skill: SkillFile, source: SkillSource) {
        let name = skill.meta.name.clone();
        if let Some(existing) = self.skills.get(&name) {
            if existing.source == SkillSource::User && source == SkillSource::Builtin {
                debug!(skill = %name, "keeping user skill over builtin");
                return;
            }
        }
        self.skills.insert(name, RegisteredSkill { skill, source });
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredSkill> {
        self.skills.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Load every per-skill subdirectory of `dir`.  A malformed entry is
    /// logged and skipped; discovery never aborts.  Returns the number of
    /// skills registered.
    pub fn load_dir(&mut self, dir: &Path, source: SkillSource) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skill directory unreadable");
                return 0;
            }
        };
        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match load_skill_dir(&path) {
                Ok(skill) => {
                    self.register(skill, source);
                    loaded += 1;
                }
                Err(e) => warn!(dir = %path.display(), error = %e, "skipping skill"),
            }
        }
        loaded
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{SkillContext, SkillFrontmatter};

    fn skill_named(name: &str, body: &str) -> SkillFile {
        SkillFile {
            meta: SkillFrontmatter {
                name: name.into(),
                description: String::new(),
                disable_model_invocation: false,
                user_invocable: true,
                allowed_tools: None,
                context: SkillContext::Inline,
                agent: None,
                model: None,
                argument_hint: None,
            },
            body: body.into(),
            dir: PathBuf::new(),
        }
    }

    #[test]
    fn user_wins_when_registered_second() {
        let mut reg = SkillRegistry::new();
        reg.register(skill_named("greet", "builtin"), SkillSource::Builtin);
        reg.register(skill_named("greet", "user"), SkillSource::User);
        let got = reg.get("greet").unwrap();
        assert_eq!(got.source, SkillSource::User);
        assert_eq!(got.skill.body, "user");
    }

    #[test]
    fn user_wins_when_registered_first() {
        let mut reg = SkillRegistry::new();
        reg.register(skill_named("greet", "user"), SkillSource::User);
        reg.register(skill_named("greet", "builtin"), SkillSource::Builtin);
        let got = reg.get("greet").unwrap();
        assert_eq!(got.source, SkillSource::User);
        assert_eq!(got.skill.body, "user");
    }

    #[test]
    fn later_user_skill_replaces_earlier_user_skill() {
        let mut reg = SkillRegistry::new();
        reg.register(skill_named("greet", "v1"), SkillSource::User);
        reg.register(skill_named("greet", "v2"), SkillSource::User);
        assert_eq!(reg.get("greet").unwrap().skill.body, "v2");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let mut reg = SkillRegistry::new();
        reg.register(skill_named("zulu", ""), SkillSource::Builtin);
        reg.register(skill_named("alpha", ""), SkillSource::Builtin);
        assert_eq!(reg.names(), vec!["alpha", "zulu"]);
    }

    #[test]
    fn load_dir_skips_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        // Valid skill
        let good = dir.path().join("good-skill");
        std::fs::create_dir(&good).unwrap();
        std::fs::write(good.join("SKILL.md"), "---\nname: good-skill\n---\nok").unwrap();
        // Broken: bad name
        let bad = dir.path().join("bad");
        std::fs::create_dir(&bad).unwrap();
        std::fs::write(bad.join("SKILL.md"), "---\nname: NOT OK\n---\nx").unwrap();
        // Broken: no SKILL.md
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let mut reg = SkillRegistry::new();
        let loaded = reg.load_dir(dir.path(), SkillSource::User);
        assert_eq!(loaded, 1);
        assert!(reg.get("good-skill").is_some());
    }

    #[test]
    fn load_dir_on_missing_directory_returns_zero() {
        let mut reg = SkillRegistry::new();
        assert_eq!(
            reg.load_dir(Path::new("/nonexistent/skills"), SkillSource::User),
            0
        );
    }
}
