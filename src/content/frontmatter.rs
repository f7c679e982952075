//! Front-matter parsing

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::helpers::parse_date_string;

lazy_static! {
    /// A `---` line at the very start, the block body, then a whole `---` line.
    /// The body is matched lazily so only the first block is taken.
    static ref FRONTMATTER_BLOCK: Regex =
        Regex::new(r"\A---\r?\n([\s\S]+?)\r?\n---(?:\r?\n|\z)")
            .expect("front-matter pattern is valid");
}

/// Front-matter data from a post
///
/// Recognized fields are typed; everything else lands in `extra`
/// in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frontmatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(rename = "authorID", skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Frontmatter {
    /// Build front-matter from a parsed YAML mapping.
    ///
    /// Never fails: a recognized key with an unusable value is kept in
    /// `extra` under its original name.
    pub fn from_mapping(mapping: Mapping) -> Self {
        let mut fm = Frontmatter::default();

        for (key, value) in mapping {
            let Some(key) = key_to_string(&key) else {
                tracing::warn!("Skipping front-matter entry with a non-scalar key");
                continue;
            };

            let applied = match key.as_str() {
                "title" | "date" | "summary" | "author" => match text_value(&value) {
                    Some(text) => {
                        let slot = match key.as_str() {
                            "title" => &mut fm.title,
                            "date" => &mut fm.date,
                            "summary" => &mut fm.summary,
                            _ => &mut fm.author,
                        };
                        *slot = text;
                        true
                    }
                    None => false,
                },
                "authorID" => match integer_value(&value) {
                    Some(id) => {
                        fm.author_id = id;
                        true
                    }
                    None => false,
                },
                "tags" => match tags_value(&value) {
                    Some(tags) => {
                        fm.tags = tags;
                        true
                    }
                    None => false,
                },
                _ => {
                    fm.extra.insert(key, value);
                    continue;
                }
            };

            if !applied {
                tracing::warn!(
                    "Front-matter field '{}' has an unexpected type, keeping it as a custom field",
                    key
                );
                fm.extra.insert(key, value);
            }
        }

        fm
    }

    /// True when no field, recognized or custom, is set
    pub fn is_empty(&self) -> bool {
        *self == Frontmatter::default()
    }

    /// The title, if present and non-empty
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Parse the date string into a DateTime
    pub fn parse_date(&self) -> Option<DateTime<Local>> {
        self.date.as_deref().and_then(parse_date_string)
    }
}

/// A raw document split into front-matter and body
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl ParsedDocument {
    /// Split a raw document into front-matter and body.
    ///
    /// This never fails. Without a leading `---` block the input comes back
    /// untouched as the body. With a block that is not a YAML mapping the
    /// front-matter is empty and the body is the trimmed text after the block.
    pub fn parse(raw: &str) -> Self {
        let Some(captures) = FRONTMATTER_BLOCK.captures(raw) else {
            return Self {
                frontmatter: Frontmatter::default(),
                body: raw.to_string(),
            };
        };

        let block_end = captures.get(0).map_or(0, |m| m.end());
        let yaml = captures.get(1).map_or("", |m| m.as_str());
        let body = raw[block_end..].trim().to_string();

        let frontmatter = match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(mapping)) => Frontmatter::from_mapping(mapping),
            Ok(other) => {
                tracing::warn!(
                    "Front-matter is not a mapping (found {}), ignoring it",
                    value_kind(&other)
                );
                Frontmatter::default()
            }
            Err(e) => {
                tracing::warn!("Failed to parse YAML front-matter: {}", e);
                Frontmatter::default()
            }
        };

        Self { frontmatter, body }
    }

    /// Rebuild a raw document from the parsed parts
    pub fn to_document(&self) -> String {
        if self.frontmatter.is_empty() {
            return self.body.clone();
        }

        match serde_yaml::to_string(&self.frontmatter) {
            Ok(yaml) => format!("---\n{}---\n\n{}", yaml, self.body),
            Err(e) => {
                tracing::warn!("Failed to serialize front-matter: {}", e);
                self.body.clone()
            }
        }
    }
}

fn key_to_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `Some(None)` for an explicit null, `None` when the shape is wrong
fn text_value(value: &Value) -> Option<Option<String>> {
    if value.is_null() {
        return Some(None);
    }
    scalar_text(value).map(Some)
}

fn integer_value(value: &Value) -> Option<Option<i64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => n.as_i64().map(Some),
        Value::String(s) => s.trim().parse().ok().map(Some),
        _ => None,
    }
}

/// Tags may be a list or a single scalar
fn tags_value(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Sequence(items) => items.iter().map(scalar_text).collect(),
        other => scalar_text(other).map(|tag| vec![tag]),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
