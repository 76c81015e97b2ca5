//! Permalink - Slugs and `/`-separated knowledge paths
//!
//! Permalinks are hierarchical, URL-safe identifiers derived from a folder and a
//! title: `generate("Project Notes", "API Design")` is `project-notes/api-design`.
//!
//! # Key Points
//! - Slugs are lowercase; any run of non-alphanumeric characters becomes one `-`
//! - Folder segments are slugified the same way as titles
//! - Paths can be matched against glob patterns: `notes/*/index`, `notes/**/*.md`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Slug used when a title has no alphanumeric characters at all
const EMPTY_SLUG: &str = "untitled";

/// Reference scheme accepted in identifiers (`memory://notes/meeting`)
pub const MEMORY_SCHEME: &str = "memory://";

/// Slugify a single segment
///
/// # Examples
/// ```
/// use notegraph::core::permalink::slugify;
///
/// assert_eq!(slugify("API Design: v2!"), "api-design-v2");
/// ```
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_separator = false;

    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Slugify every segment of a folder path, dropping empty segments
pub fn slugify_folder(folder: &str) -> String {
    folder
        .split(['/', '\\'])
        .map(slugify)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Base permalink for (folder, title), before collision handling
pub fn generate(folder: &str, title: &str) -> String {
    let mut leaf = slugify(title);
    if leaf.is_empty() {
        leaf = EMPTY_SLUG.to_string();
    }

    let folder = slugify_folder(folder);
    if folder.is_empty() {
        leaf
    } else {
        format!("{}/{}", folder, leaf)
    }
}

/// Normalize an identifier for permalink lookup
///
/// Strips the `memory://` scheme, surrounding slashes and a `.md` suffix.
pub fn normalize_identifier(s: &str) -> String {
    let s = s.trim();
    let s = s.strip_prefix(MEMORY_SCHEME).unwrap_or(s);
    let s = s.trim_matches('/');
    let s = s.strip_suffix(".md").unwrap_or(s);
    s.to_string()
}

/// A `/`-separated path (permalink, folder or file path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KbPath {
    segments: Vec<String>,
}

impl KbPath {
    /// Parse a path string; empty input (or `/`) is the root
    pub fn parse(s: &str) -> Self {
        let segments = s
            .trim()
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn parent(&self) -> Option<KbPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(KbPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment (leaf name)
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Leaf name without its extension (`meeting` for `notes/meeting.md`)
    pub fn stem(&self) -> Option<&str> {
        self.name()
            .map(|n| n.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(n))
    }

    /// Check if this path starts with another path (is a descendant or equal)
    pub fn starts_with(&self, prefix: &KbPath) -> bool {
        if prefix.segments.len() > self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(prefix.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// Check if path matches a glob pattern
    ///
    /// Patterns:
    /// - `**` matches any number of segments (including zero)
    /// - `*` matches any single segment
    /// - `*` and `?` inside a segment match characters (`*.md`, `note-?`)
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        let pattern_segments: Vec<&str> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        Self::match_segments(&self.segments, &pattern_segments)
    }

    fn match_segments(path: &[String], pattern: &[&str]) -> bool {
        match (path.first(), pattern.first()) {
            (None, None) => true,
            (Some(_), None) => false,
            (None, Some(&"**")) => Self::match_segments(path, &pattern[1..]),
            (None, Some(_)) => false,
            (Some(_), Some(&"**")) => {
                Self::match_segments(path, &pattern[1..])
                    || Self::match_segments(&path[1..], pattern)
            }
            (Some(p), Some(pat)) => {
                wildcard_match(p.as_bytes(), pat.as_bytes())
                    && Self::match_segments(&path[1..], &pattern[1..])
            }
        }
    }
}

/// Match one segment against a pattern with `*` and `?`
fn wildcard_match(text: &[u8], pattern: &[u8]) -> bool {
    match (text.first(), pattern.first()) {
        (_, None) => text.is_empty(),
        (_, Some(b'*')) => {
            wildcard_match(text, &pattern[1..])
                || (!text.is_empty() && wildcard_match(&text[1..], pattern))
        }
        (None, Some(_)) => false,
        (Some(_), Some(b'?')) => wildcard_match(&text[1..], &pattern[1..]),
        (Some(t), Some(p)) => t == p && wildcard_match(&text[1..], &pattern[1..]),
    }
}

impl fmt::Display for KbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for KbPath {
    fn from(s: &str) -> Self {
        KbPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Meeting"), "meeting");
        assert_eq!(slugify("API Design: v2!"), "api-design-v2");
        assert_eq!(slugify("  --Hello   World--  "), "hello-world");
        assert_eq!(slugify("Café Crème"), "café-crème");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_generate() {
        assert_eq!(generate("notes", "Meeting"), "notes/meeting");
        assert_eq!(generate("Project Notes/2024", "API Design"), "project-notes/2024/api-design");
        assert_eq!(generate("", "Meeting"), "meeting");
        assert_eq!(generate("/notes/", "Meeting"), "notes/meeting");
        assert_eq!(generate("notes", "???"), "notes/untitled");
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("memory://notes/meeting"), "notes/meeting");
        assert_eq!(normalize_identifier(" /notes/meeting/ "), "notes/meeting");
        assert_eq!(normalize_identifier("notes/meeting.md"), "notes/meeting");
        assert_eq!(normalize_identifier("Meeting"), "Meeting");
    }

    #[test]
    fn test_parse_with_slashes() {
        let a = KbPath::parse("/notes/alpha/");
        let b = KbPath::parse("notes//alpha");
        assert_eq!(a, b);
        assert_eq!(a.depth(), 2);
        assert_eq!(KbPath::parse("/").depth(), 0);
        assert_eq!(KbPath::parse("").depth(), 0);
    }

    #[test]
    fn test_parent_and_name() {
        let path = KbPath::parse("notes/deep/meeting.md");
        assert_eq!(path.parent().unwrap().to_string(), "notes/deep");
        assert_eq!(path.name(), Some("meeting.md"));
        assert_eq!(path.stem(), Some("meeting"));
        assert!(KbPath::parse("").parent().is_none());
    }

    #[test]
    fn test_starts_with() {
        let path = KbPath::parse("notes/alpha/meeting");
        assert!(path.starts_with(&KbPath::parse("notes")));
        assert!(path.starts_with(&KbPath::parse("")));
        assert!(path.starts_with(&path));
        assert!(!path.starts_with(&KbPath::parse("notes/beta")));
        // Segment-wise, not string-wise
        assert!(!KbPath::parse("notes-old/a").starts_with(&KbPath::parse("notes")));
    }


    #[test]
    fn test_wildcards() {
        let path = KbPath::parse("notes/alpha/meeting.md");
        assert!(path.matches_pattern("notes/*/meeting.md"));
        assert!(path.matches_pattern("notes/**/*.md"));
        assert!(path.matches_pattern("**/*.md"));
        assert!(path.matches_pattern("notes/alpha/meet?ng.md"));
        assert!(!path.matches_pattern("notes/*.md"));
        assert!(!path.matches_pattern("notes/**/*.txt"));
    }

    #[test]
    fn test_double_wildcard_zero_segments() {
        let path = KbPath::parse("notes/meeting.md");
        assert!(path.matches_pattern("notes/**/meeting.md"));
        assert!(path.matches_pattern("**/notes/*.md"));
    }
}
