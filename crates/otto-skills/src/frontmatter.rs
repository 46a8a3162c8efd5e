// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! YAML frontmatter splitting and writing.
//!
//! Frontmatter is delimited by `---` on its own line at the very start of
//! the file:
//!
//! ```markdown
//! ---
//! name: my-skill
//! description: does a thing
//! ---
//!
//! Body text.
//! ```

/// Split a document into `(yaml, body)`.
///
/// Returns `None` when the document has no frontmatter — no leading `---`
/// or no closing delimiter.  The YAML slice excludes both delimiter lines;
/// the body starts right after the closing delimiter line.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let header = if let Some(rest) = content.strip_prefix("---\n") {
        rest
    } else if let Some(rest) = content.strip_prefix("---\r\n") {
        rest
    } else {
        return None;
    };

    let close_unix = header.find("\n---\n");
    let close_crlf = header.find("\n---\r\n");
    let (yaml_end, delim_len) = match (close_unix, close_crlf) {
        (Some(u), Some(c)) if u <= c => (u, "\n---\n".len()),
        (_, Some(c)) => (c, "\n---\r\n".len()),
        (Some(u), _) => (u, "\n---\n".len()),
        (None, None) => return None,
    };

    Some((&header[..yaml_end], &header[yaml_end + delim_len..]))
}

/// Compose a document from YAML frontmatter and a body.
///
/// Inverse of [`split_frontmatter`]: `split_frontmatter(&write_frontmatter(y, b))`
/// yields `(y, b)` for any `y` without a bare `---` line.
pub fn write_frontmatter(yaml: &str, body: &str) -> String {
    let yaml = yaml.trim_end_matches('\n');
    format!("---\n{yaml}\n---\n{body}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_frontmatter_returns_none() {
        assert!(split_frontmatter("# Heading\nbody").is_none());
    }

    #[test]
    fn missing_closing_delimiter_returns_none() {
        assert!(split_frontmatter("---\nname: x\nno closing").is_none());
    }

    #[test]
    fn well_formed_document_splits() {
        let doc = "---\nname: my-skill\n---\nBody line.";
        let (yaml, body) = split_frontmatter(doc).unwrap();
        assert_eq!(yaml, "name: my-skill");
        assert_eq!(body, "Body line.");
    }

    #[test]
    fn crlf_delimiters_are_handled() {
        let doc = "---\r\nname: x\r\n---\r\nBody.";
        let (yaml, body) = split_frontmatter(doc).unwrap();
        assert_eq!(yaml, "name: x\r");
        assert_eq!(body, "Body.");
    }

    #[test]
    fn body_split_is_exact() {
        let doc = "---\nname: t\n---\n# Heading\nContent here.";
        let (_, body) = split_frontmatter(doc).unwrap();
        assert_eq!(body, "# Heading\nContent here.");
    }

    #[test]
    fn write_then_split_round_trips() {
        let yaml = "name: demo\nstatus: active";
        let body = "Project notes.\n\nMore notes.";
        let doc = write_frontmatter(yaml, body);
        let (y, b) = split_frontmatter(&doc).unwrap();
        assert_eq!(y, yaml);
        assert_eq!(b, body);
    }

    #[test]
    fn write_normalizes_trailing_yaml_newline() {
        let doc = write_frontmatter("name: x\n", "b");
        assert_eq!(doc, "---\nname: x\n---\nb");
    }
}
