//! Parser - Extract semantic content from note text
//!
//! Pure and best-effort: any input parses, unrecognized lines are simply not
//! extracted. Lines that look like semantic markup but do not fit the grammar
//! are reported as [`ParseWarning`]s.
//!
//! # Grammar
//! - Observation: `- [category] text #tag1 #tag2`
//! - Declared relation: `- relation_type [[Target Title]]`
//! - Inline relation: `[[Target Title]]` anywhere in the body (`relates_to`)
//!
//! A target named by a declared relation is never duplicated by the inline
//! scan; inline targets are otherwise kept once each, in order of appearance.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::entity::{Observation, Relation};
use super::format::{self, Frontmatter, Split};

static OBSERVATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+\[(\w+)\]\s+(\S.*?)\s*$").unwrap());
static RELATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+(\w+)\s+\[\[([^\]]+)\]\]").unwrap());
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s+)#(\w[\w-]*)").unwrap());
static OBSERVATION_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+\[").unwrap());
static TASK_CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+\[[ xX]?\]").unwrap());
static LINK_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+\[\[").unwrap());
static RELATION_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+\w+\s+\[\[").unwrap());

/// What went wrong on a line that was not extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// `- [` line that is not a valid observation
    MalformedObservation,
    /// `- type [[` line without a closing `]]`
    MalformedRelation,
    /// Frontmatter block that is not a YAML mapping of known shape
    InvalidFrontmatter,
    /// Opening `---` without a closing fence
    UnterminatedFrontmatter,
}

/// A line that looked like markup but was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line number in the full text
    pub line: usize,
    pub kind: WarningKind,
    pub text: String,
}

/// Structured content of one note
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedNote {
    pub frontmatter: Frontmatter,
    /// Text after the frontmatter block
    pub body: String,
    pub observations: Vec<Observation>,
    pub relations: Vec<Relation>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse raw note text
pub fn parse(text: &str) -> ParsedNote {
    let mut warnings = Vec::new();

    let (frontmatter, body, body_line) = match format::split_frontmatter(text) {
        Split::None => (Frontmatter::default(), text, 1),
        Split::Found {
            yaml,
            body,
            body_line,
        } => (parse_yaml(yaml, &mut warnings), body, body_line),
        Split::Unterminated => {
            warnings.push(ParseWarning {
                line: 1,
                kind: WarningKind::UnterminatedFrontmatter,
                text: "---".to_string(),
            });
            (Frontmatter::default(), text, 1)
        }
    };

    let observations = extract_observations(body, body_line, &mut warnings);
    let relations = extract_relations(body, body_line, &mut warnings);

    ParsedNote {
        frontmatter,
        body: body.to_string(),
        observations,
        relations,
        warnings,
    }
}

fn parse_yaml(yaml: &str, warnings: &mut Vec<ParseWarning>) -> Frontmatter {
    if yaml.trim().is_empty() {
        return Frontmatter::default();
    }
    match serde_yaml::from_str::<Frontmatter>(yaml) {
        Ok(fm) => fm,
        Err(e) => {
            warnings.push(ParseWarning {
                line: e.location().map(|l| l.line() + 1).unwrap_or(1),
                kind: WarningKind::InvalidFrontmatter,
                text: e.to_string(),
            });
            Frontmatter::default()
        }
    }
}

/// Observations in order of appearance
fn extract_observations(
    body: &str,
    first_line: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<Observation> {
    let mut observations = Vec::new();

    for (i, line) in body.lines().enumerate() {
        if TASK_CHECKBOX_RE.is_match(line) {
            continue;
        }

        if let Some(caps) = OBSERVATION_RE.captures(line) {
            let (content, tags) = extract_tags(&caps[2]);
            observations.push(Observation {
                category: caps[1].to_string(),
                content,
                tags,
            });
        } else if OBSERVATION_START_RE.is_match(line) && !LINK_ITEM_RE.is_match(line) {
            warnings.push(ParseWarning {
                line: first_line + i,
                kind: WarningKind::MalformedObservation,
                text: line.to_string(),
            });
        }
    }

    observations
}

/// Split `#tag` tokens out of observation text
pub fn extract_tags(text: &str) -> (String, Vec<String>) {
    let mut tags: Vec<String> = Vec::new();
    for caps in TAG_RE.captures_iter(text) {
        let tag = caps[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let content = TAG_RE.replace_all(text, "").trim().to_string();
    (content, tags)
}

/// Declared relations first, then inline links not already covered
fn extract_relations(
    body: &str,
    first_line: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<Relation> {
    let mut relations: Vec<Relation> = Vec::new();
    let mut declared_pairs: HashSet<(String, String)> = HashSet::new();
    let mut covered_targets: HashSet<String> = HashSet::new();

    for (i, line) in body.lines().enumerate() {
        if let Some(caps) = RELATION_RE.captures(line) {
            let relation_type = caps[1].to_string();
            let target = caps[2].trim().to_string();
            if target.is_empty() {
                continue;
            }
            if declared_pairs.insert((relation_type.clone(), target.clone())) {
                covered_targets.insert(target.clone());
                relations.push(Relation::new(relation_type, target));
            }
        } else if RELATION_START_RE.is_match(line) && !WIKILINK_RE.is_match(line) {
            warnings.push(ParseWarning {
                line: first_line + i,
                kind: WarningKind::MalformedRelation,
                text: line.to_string(),
            });
        }
    }

    for caps in WIKILINK_RE.captures_iter(body) {
        let target = caps[1].trim();
        if target.is_empty() || covered_targets.contains(target) {
            continue;
        }
        covered_targets.insert(target.to_string());
        relations.push(Relation::inline(target));
    }

    relations
}
