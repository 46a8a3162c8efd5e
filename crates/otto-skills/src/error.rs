// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Errors raised by skill and project file handling.
///
/// Discovery code logs these per entry and skips — a malformed skill never
/// aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("invalid name \"{0}\"")]
    InvalidName(String),
    #[error("missing {file} in {dir}")]
    MissingFile { file: String, dir: String },
    #[error("missing frontmatter in {0}")]
    MissingFrontmatter(String),
    #[error("parsing {path}: {message}")]
    Parse { path: String, message: String },
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("illegal project status transition {from} -> {to}")]
    IllegalStatusTransition { from: String, to: String },
}
