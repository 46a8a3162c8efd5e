// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{split_frontmatter, validate_name, write_frontmatter, SkillError};

/// Lifecycle state of a project.
///
/// Legal transitions: active ↔ suspended, active → completed,
/// completed → archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Suspended,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn can_transition(self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, to),
            (Active, Suspended) | (Suspended, Active) | (Active, Completed) | (Completed, Archived)
        )
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

/// Frontmatter of a `PROJECT.md` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFrontmatter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,
}

/// A loaded project directory.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    pub meta: ProjectFrontmatter,
    pub body: String,
    pub dir: PathBuf,
}

impl ProjectFile {
    /// Change status, enforcing the legal transition table.
    pub fn set_status(&mut self, to: ProjectStatus) -> Result<(), SkillError> {
        if !self.meta.status.can_transition(to) {
            return Err(SkillError::IllegalStatusTransition {
                from: self.meta.status.to_string(),
                to: to.to_string(),
            });
        }
        self.meta.status = to;
        Ok(())
    }

    /// Persist `PROJECT.md` back into the project directory.
    pub fn save(&self) -> Result<(), SkillError> {
        write_project_file(&self.dir, &self.meta, &self.body)
    }
}

/// Standard subdirectories scaffolded inside every project.
pub const PROJECT_SUBDIRS: &[&str] = &[
    "session",
    "memory/facts",
    "memory/episodes",
    "tasks",
    "skills",
];

/// Create the standard project layout under `dir`.
pub fn scaffold_project_dirs(dir: &Path) -> Result<(), SkillError> {
    for sub in PROJECT_SUBDIRS {
        let path = dir.join(sub);
        std::fs::create_dir_all(&path).map_err(|source| SkillError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Write a `PROJECT.md` with serialized frontmatter and the given body.
pub fn write_project_file(
    dir: &Path,
    meta: &ProjectFrontmatter,
    body: &str,
) -> Result<(), SkillError> {
    let yaml = serde_yaml::to_string(meta).map_err(|e| SkillError::Parse {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    let path = dir.join("PROJECT.md");
    std::fs::write(&path, write_frontmatter(&yaml, body)).map_err(|source| SkillError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load a project directory containing `PROJECT.md`.
pub fn load_project_dir(dir: &Path) -> Result<ProjectFile, SkillError> {
    let path = dir.join("PROJECT.md");
    if !path.is_file() {
        return Err(SkillError::MissingFile {
            file: "PROJECT.md".into(),
            dir: dir.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(&path).map_err(|source| SkillError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let (yaml, body) = split_frontmatter(&content)
        .ok_or_else(|| SkillError::MissingFrontmatter(path.display().to_string()))?;
    let meta: ProjectFrontmatter = serde_yaml::from_str(yaml).map_err(|e| SkillError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    validate_name(&meta.name)?;
    Ok(ProjectFile {
        meta,
        body: body.to_string(),
        dir: dir.to_path_buf(),
    })
}

/// Load every project under `root`.  Malformed entries are logged and
/// skipped.
pub fn load_projects(root: &Path) -> Vec<ProjectFile> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %root.display(), error = %e, "project root unreadable");
            return Vec::new();
        }
    };
    let mut projects = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match load_project_dir(&path) {
            Ok(project) => projects.push(project),
            Err(e) => warn!(dir = %path.display(), error = %e, "skipping project"),
        }
    }
    projects
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, status: ProjectStatus) -> ProjectFrontmatter {
        ProjectFrontmatter {
            name: name.into(),
            description: "a test project".into(),
            status,
        }
    }

    // ── Status transitions ────────────────────────────────────────────────────

    #[test]
    fn legal_transitions() {
        use ProjectStatus::*;
        assert!(Active.can_transition(Suspended));
        assert!(Suspended.can_transition(Active));
        assert!(Active.can_transition(Completed));
        assert!(Completed.can_transition(Archived));
    }

    #[test]
    fn illegal_transitions() {
        use ProjectStatus::*;
        assert!(!Archived.can_transition(Active));
        assert!(!Completed.can_transition(Active));
        assert!(!Suspended.can_transition(Completed));
        assert!(!Active.can_transition(Archived));
        assert!(!Active.can_transition(Active));
    }

    #[test]
    fn set_status_enforces_table() {
        let mut p = ProjectFile {
            meta: meta("demo", ProjectStatus::Active),
            body: String::new(),
            dir: PathBuf::new(),
        };
        p.set_status(ProjectStatus::Completed).unwrap();
        let err = p.set_status(ProjectStatus::Active).unwrap_err();
        assert!(err.to_string().contains("completed -> active"));
    }

    // ── Round trip ────────────────────────────────────────────────────────────

    #[test]
    fn write_then_load_preserves_meta_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Goal: ship it.\n\n## Notes\nnone yet.";
        write_project_file(dir.path(), &meta("demo", ProjectStatus::Active), body).unwrap();

        let loaded = load_project_dir(dir.path()).unwrap();
        assert_eq!(loaded.meta.name, "demo");
        assert_eq!(loaded.meta.description, "a test project");
        assert_eq!(loaded.meta.status, ProjectStatus::Active);
        assert_eq!(loaded.body, body);
    }

    #[test]
    fn scaffold_creates_standard_layout() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project_dirs(dir.path()).unwrap();
        for sub in PROJECT_SUBDIRS {
            assert!(dir.path().join(sub).is_dir(), "{sub} should exist");
        }
    }

    #[test]
    fn load_projects_skips_malformed() {
        let root = tempfile::tempdir().unwrap();
        let good = root.path().join("good");
        std::fs::create_dir(&good).unwrap();
        write_project_file(&good, &meta("good", ProjectStatus::Active), "ok").unwrap();

        let bad = root.path().join("bad");
        std::fs::create_dir(&bad).unwrap();
        std::fs::write(bad.join("PROJECT.md"), "no frontmatter here").unwrap();

        let projects = load_projects(root.path());
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].meta.name, "good");
    }

    #[test]
    fn invalid_project_name_rejects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("PROJECT.md"),
            "---\nname: Bad Name\nstatus: active\n---\nx",
        )
        .unwrap();
        assert!(matches!(
            load_project_dir(dir.path()),
            Err(SkillError::InvalidName(_))
        ));
    }
}
