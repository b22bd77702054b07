use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::fingerprint::model::{ElementDescriptor, validate_elements};

/// Remove a Markdown code fence wrapping the whole reply, if present.
///
/// Handles an optional language tag on the opening fence (```` ```json ````),
/// whether the content starts on the next line or on the tag's own line.
/// Text that is not fully wrapped is returned trimmed but otherwise untouched.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let tag_len = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
    let after_tag = rest[tag_len..].trim_start_matches([' ', '\t']);
    let body = if tag_len == 0 {
        rest
    } else if after_tag.is_empty() || after_tag.starts_with(['\n', '\r', '{', '[']) {
        after_tag
    } else {
        // A word followed by prose or code is content, not a tag.
        rest
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')
}

/// Shape of a locator reply after fence stripping and JSON parsing.
///
/// Nothing enters the typed fingerprint model until `into_elements` has
/// checked it.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// A bare JSON object, as requested.
    Mapping(Map<String, Value>),
    /// A single-element array holding the object; a known oracle quirk.
    UnwrappedList(Map<String, Value>),
    /// Anything else, with the reason it was rejected.
    Malformed(String),
}

impl OracleReply {
    pub fn parse(raw: &str) -> Self {
        let cleaned = strip_code_fences(raw);
        let value: Value = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(e) => return OracleReply::Malformed(format!("invalid JSON: {}", e)),
        };

        match value {
            Value::Object(map) => OracleReply::Mapping(map),
            Value::Array(mut items) if items.len() == 1 => match items.pop() {
                Some(Value::Object(map)) => OracleReply::UnwrappedList(map),
                _ => OracleReply::Malformed("single-element list does not hold an object".into()),
            },
            Value::Array(items) => {
                OracleReply::Malformed(format!("expected an object, got a list of {}", items.len()))
            }
            other => OracleReply::Malformed(format!("expected an object, got {}", kind(&other))),
        }
    }

    /// Convert into validated element descriptors.
    pub fn into_elements(self) -> Result<BTreeMap<String, ElementDescriptor>, String> {
        let map = match self {
            OracleReply::Mapping(map) | OracleReply::UnwrappedList(map) => map,
            OracleReply::Malformed(reason) => return Err(reason),
        };

        if map.is_empty() {
            return Err("reply contains no elements".into());
        }

        let elements: BTreeMap<String, ElementDescriptor> =
            serde_json::from_value(Value::Object(map))
                .map_err(|e| format!("element descriptors do not match schema: {}", e))?;
        validate_elements(&elements)?;
        Ok(elements)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
