// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{split_frontmatter, SkillError};

fn default_true() -> bool {
    true
}

/// Name contract shared by skills and projects: lowercase alphanumeric plus
/// dashes, must not start with a dash, at most 64 characters.
pub fn validate_name(name: &str) -> Result<(), SkillError> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").expect("name regex must compile")
    });
    if re.is_match(name) {
        Ok(())
    } else {
        Err(SkillError::InvalidName(name.to_string()))
    }
}

/// Execution context requested by a skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillContext {
    #[default]
    Inline,
    Fork,
}

/// Frontmatter of a `SKILL.md` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillFrontmatter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "disable-model-invocation", default)]
    pub disable_model_invocation: bool,
    #[serde(rename = "user-invocable", default = "default_true")]
    pub user_invocable: bool,
    /// Comma-separated tool allowlist; `None` allows everything.
    #[serde(rename = "allowed-tools", default)]
    pub allowed_tools: Option<String>,
    #[serde(default)]
    pub context: SkillContext,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(rename = "argument-hint", default)]
    pub argument_hint: Option<String>,
}

impl SkillFrontmatter {
    /// The allowlist as trimmed names; empty when unrestricted.
    pub fn allowed_tools_list(&self) -> Vec<String> {
        self.allowed_tools
            .as_deref()
            .map(|csv| {
                csv.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A loaded skill: validated frontmatter plus the markdown body.
#[derive(Debug, Clone)]
pub struct SkillFile {
    pub meta: SkillFrontmatter,
    pub body: String,
    pub dir: PathBuf,
}

/// Parse a `SKILL.md` document.  `origin` labels errors.
pub fn parse_skill(content: &str, origin: &str) -> Result<(SkillFrontmatter, String), SkillError> {
    let (yaml, body) =
        split_frontmatter(content).ok_or_else(|| SkillError::MissingFrontmatter(origin.into()))?;
    let meta: SkillFrontmatter = serde_yaml::from_str(yaml).map_err(|e| SkillError::Parse {
        path: origin.into(),
        message: e.to_string(),
    })?;
    validate_name(&meta.name)?;
    Ok((meta, body.to_string()))
}

/// Load a per-skill directory containing `SKILL.md`.
pub fn load_skill_dir(dir: &Path) -> Result<SkillFile, SkillError> {
    let path = dir.join("SKILL.md");
    if !path.is_file() {
        return Err(SkillError::MissingFile {
            file: "SKILL.md".into(),
            dir: dir.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(&path).map_err(|source| SkillError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let (meta, body) = parse_skill(&content, &path.display().to_string())?;
    Ok(SkillFile {
        meta,
        body,
        dir: dir.to_path_buf(),
    })
}

/// Substitute argument tokens into a skill body.
///
/// - `$ARGUMENTS` — the raw argument string
/// - `$ARGUMENTS[N]` — the N-th whitespace-separated argument (0-based)
/// - `$N` — the N-th argument, shell-style 1-based; only when `N` is a
///   single digit not followed by another digit
///
/// When the body contains no token at all and `args` is non-empty, the raw
/// arguments are appended as `\n\nARGUMENTS: {args}`.
pub fn render_body(body: &str, args: &str) -> String {
    let words: Vec<&str> = args.split_whitespace().collect();
    let mut out = String::with_capacity(body.len() + args.len());
    let mut substituted = false;

    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            let ch_len = utf8_len(bytes[i]);
            out.push_str(&body[i..i + ch_len]);
            i += ch_len;
            continue;
        }
        let rest = &body[i + 1..];
        if let Some(tail) = rest.strip_prefix("ARGUMENTS[") {
            if let Some(close) = tail.find(']') {
                if let Ok(n) = tail[..close].parse::<usize>() {
                    out.push_str(words.get(n).copied().unwrap_or(""));
                    substituted = true;
                    i += 1 + "ARGUMENTS[".len() + close + 1;
                    continue;
                }
            }
        }
        if rest.starts_with("ARGUMENTS") {
            out.push_str(args);
            substituted = true;
            i += 1 + "ARGUMENTS".len();
            continue;
        }
        let mut chars = rest.bytes();
        if let Some(d) = chars.next().filter(|b| b.is_ascii_digit()) {
            let followed_by_digit = chars.next().is_some_and(|b| b.is_ascii_digit());
            if !followed_by_digit {
                let n = (d - b'0') as usize;
                if n >= 1 {
                    out.push_str(words.get(n - 1).copied().unwrap_or(""));
                    substituted = true;
                    i += 2;
                    continue;
                }
            }
        }
        out.push('$');
        i += 1;
    }

    if !substituted && !args.trim().is_empty() {
        out.push_str("\n\nARGUMENTS: ");
        out.push_str(args);
    }
    out
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
