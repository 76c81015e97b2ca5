//! Note file format - YAML frontmatter + Markdown body
//!
//! ```text
//! ---
//! title: API Design
//! type: spec
//! permalink: notes/api-design
//! tags:
//! - api
//! created: 2024-05-01T09:30:00Z
//! updated: 2024-05-02T10:00:00Z
//! ---
//! - [decision] Use REST #api
//! - implements [[Auth Spec]]
//! ```
//!
//! The file is the only durable state. Unknown frontmatter keys are carried
//! through untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::entity::Entity;
use super::error::Result;

const FENCE: &str = "---";

/// Structured metadata block at the top of a note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,

    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,

    /// Keys this engine does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Frontmatter {
    /// Frontmatter describing `entity`, keeping `extra` keys
    pub fn for_entity(entity: &Entity, extra: BTreeMap<String, serde_yaml::Value>) -> Self {
        Self {
            title: Some(entity.title.clone()),
            entity_type: Some(entity.entity_type.clone()),
            permalink: Some(entity.permalink.clone()),
            tags: entity.tags.clone(),
            created: Some(entity.created_at),
            updated: Some(entity.updated_at),
            extra,
        }
    }

    /// Whether every key the engine persists is present
    pub fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.entity_type.is_some()
            && self.permalink.is_some()
            && self.created.is_some()
            && self.updated.is_some()
    }
}

/// Accepts `[a, b]`, a block list, or `"a, b"`; strips leading `#`
fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;

    let raw: Vec<String> = match value {
        Some(serde_yaml::Value::Sequence(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_yaml::Value::String(s) => Some(s),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                serde_yaml::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        Some(serde_yaml::Value::String(s)) => s.split(',').map(|t| t.to_string()).collect(),
        _ => Vec::new(),
    };

    Ok(normalize_tags(raw))
}

/// Trim, strip `#`, drop empties and duplicates (first occurrence wins)
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().trim_start_matches('#').trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`; anything else is dropped
fn deserialize_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|v| v.as_str()).and_then(parse_timestamp))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Result of locating the frontmatter block
#[derive(Debug, PartialEq, Eq)]
pub enum Split<'a> {
    /// No block: the whole text is body
    None,
    /// Block found: raw YAML, body, and the 1-based line the body starts on
    Found {
        yaml: &'a str,
        body: &'a str,
        body_line: usize,
    },
    /// Opening fence without a closing one
    Unterminated,
}

/// Locate a leading `---` ... `---` block
pub fn split_frontmatter(text: &str) -> Split<'_> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let first_end = match text.find('\n') {
        Some(i) => i,
        None => return Split::None,
    };
    if text[..first_end].trim_end() != FENCE {
        return Split::None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    let mut line_no = 1;
    for line in text[yaml_start..].split_inclusive('\n') {
        line_no += 1;
        let trimmed = line.trim_end();
        if trimmed == FENCE || trimmed == "..." {
            return Split::Found {
                yaml: &text[yaml_start..offset],
                body: &text[offset + line.len()..],
                body_line: line_no + 1,
            };
        }
        offset += line.len();
    }

    Split::Unterminated
}

/// Render frontmatter and body into file text
pub fn render(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_split_none() {
        assert_eq!(split_frontmatter("just a body"), Split::None);
        assert_eq!(split_frontmatter("# Title\n---\n"), Split::None);
    }

    #[test]
    fn test_split_found() {
        let text = "---\ntitle: A\n---\nbody line\n";
        match split_frontmatter(text) {
            Split::Found {
                yaml,
                body,
                body_line,
            } => {
                assert_eq!(yaml, "title: A\n");
                assert_eq!(body, "body line\n");
                assert_eq!(body_line, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_split_unterminated() {
        assert_eq!(split_frontmatter("---\ntitle: A\nno end"), Split::Unterminated);
    }

    #[test]
    fn test_render_and_reparse() -> Result<()> {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let mut fm = Frontmatter {
            title: Some("API: Design".to_string()),
            entity_type: Some("spec".to_string()),
            permalink: Some("notes/api-design".to_string()),
            tags: vec!["api".to_string()],
            created: Some(created),
            updated: Some(created),
            extra: BTreeMap::new(),
        };
        fm.extra
            .insert("aliases".to_string(), serde_yaml::Value::String("api".into()));

        let text = render(&fm, "- [decision] Use REST\n")?;
        assert!(text.starts_with("---\ntitle:"));

        let Split::Found { yaml, body, .. } = split_frontmatter(&text) else {
            panic!("frontmatter not found");
        };
        let parsed: Frontmatter = serde_yaml::from_str(yaml)?;
        assert_eq!(parsed, fm);
        assert_eq!(body, "- [decision] Use REST\n");
        Ok(())
    }

    #[test]
    fn test_tags_forms() {
        let list: Frontmatter = serde_yaml::from_str("tags: [a, '#b', a]").unwrap();
        assert_eq!(list.tags, vec!["a", "b"]);

        let csv: Frontmatter = serde_yaml::from_str("tags: \"x, y ,, #z\"").unwrap();
        assert_eq!(csv.tags, vec!["x", "y", "z"]);

        let none: Frontmatter = serde_yaml::from_str("tags:").unwrap();
        assert!(none.tags.is_empty());
    }

    #[test]
    fn test_lenient_timestamps() {
        let fm: Frontmatter =
            serde_yaml::from_str("created: 2024-05-01\nupdated: not a date").unwrap();
        assert_eq!(
            fm.created,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert!(fm.updated.is_none());
    }

    #[test]
    fn test_is_complete() {
        let now = Utc::now();
        let entity = Entity::new("A", "notes/a", now);
        assert!(Frontmatter::for_entity(&entity, BTreeMap::new()).is_complete());
        assert!(!Frontmatter::default().is_complete());
    }
}
