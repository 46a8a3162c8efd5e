// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod error;
mod frontmatter;
mod project;
mod registry;
mod skill;

pub use error::SkillError;
pub use frontmatter::{split_frontmatter, write_frontmatter};
pub use project::{
    load_project_dir, load_projects, scaffold_project_dirs, write_project_file, ProjectFile,
    ProjectFrontmatter, ProjectStatus, PROJECT_SUBDIRS,
};
pub use registry::{RegisteredSkill, SkillRegistry, SkillSource};
pub use skill::{
    load_skill_dir, parse_skill, render_body, validate_name, SkillContext, SkillFile,
    SkillFrontmatter,
};
