//! Pipeline document parsing
//!
//! The YAML parser is consumed as a library; this module wraps it with the
//! JSON projection the schema validators operate on and the best-effort
//! line mapping used to anchor schema errors.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to convert YAML to JSON: {0}")]
    Projection(String),
}

/// A parsed pipeline document: the raw text plus its JSON projection.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub content: String,
    pub json: JsonValue,
}

impl Pipeline {
    /// Parse pipeline YAML and project it onto JSON.
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        let yaml: YamlValue = serde_yaml::from_str(content)?;
        let json = yaml_to_json(yaml)?;

        Ok(Self {
            content: content.to_string(),
            json,
        })
    }

    /// The JSON projection serialized to bytes, as handed to the schema
    /// validator.
    pub fn json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.json).unwrap_or_default()
    }

    /// Navigate the JSON projection by key path.
    pub fn find_node_by_path(&self, path: &[&str]) -> Option<&JsonValue> {
        let mut node = &self.json;
        for segment in path {
            node = node.as_object()?.get(*segment)?;
        }
        Some(node)
    }

    /// Best-effort line (1-based) for a schema validation message. When
    /// the offending property token exists verbatim in the text this
    /// points at the first line containing it; otherwise it scans for
    /// known invalid-token patterns and falls back to line 1.
    pub fn line_for_error(&self, message: &str, property: Option<&str>) -> usize {
        let lines: Vec<&str> = self.content.split('\n').collect();

        if let Some(property) = property {
            if !property.is_empty() {
                for (i, line) in lines.iter().enumerate() {
                    if line.contains(property) {
                        return i + 1;
                    }
                }
            }
        }

        for pattern in ["invalid_field", "unknown_property", "bad_field"] {
            for (i, line) in lines.iter().enumerate() {
                if line.contains(pattern) {
                    return i + 1;
                }
            }
        }

        // Quoted tokens in the message are usually property names.
        for token in quoted_tokens(message) {
            for (i, line) in lines.iter().enumerate() {
                if line.contains(&token) {
                    return i + 1;
                }
            }
        }

        1
    }
}

/// Project a YAML value onto JSON. Scalar mapping keys are stringified;
/// anything else is rejected.
fn yaml_to_json(value: YamlValue) -> Result<JsonValue, ParseError> {
    match value {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::from(u))
            } else if let Some(f) = n.as_f64() {
                Ok(serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null))
            } else {
                Ok(JsonValue::Null)
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s)),
        YamlValue::Sequence(seq) => Ok(JsonValue::Array(
            seq.into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        YamlValue::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let key = match key {
                    YamlValue::String(s) => s,
                    YamlValue::Bool(b) => b.to_string(),
                    YamlValue::Number(n) => n.to_string(),
                    other => {
                        return Err(ParseError::Projection(format!(
                            "unsupported mapping key: {other:?}"
                        )))
                    }
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Ok(JsonValue::Object(object))
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn quoted_tokens(message: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = message;
    while let Some(start) = rest.find('\'') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('\'') else { break };
        if end > 0 {
            tokens.push(after[..end].to_string());
        }
        rest = &after[end + 1..];
    }
    tokens
}
