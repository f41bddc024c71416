//! Buildkite pipeline schema evaluation
//!
//! Fetches the canonical pipeline JSON Schema once per process, compiles
//! it lazily under a double-checked read/write lock, and reduces a
//! multi-error validation result to the single most actionable error.

use std::sync::Arc;

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

/// Canonical source for the Buildkite pipeline schema.
pub const PIPELINE_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/buildkite/pipeline-schema/refs/heads/main/schema.json";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to fetch schema: {0}")]
    Fetch(String),
    #[error("failed to fetch schema: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to compile schema: {0}")]
    Compile(String),
}

/// The primary error selected from a validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// User-facing message
    pub message: String,
    /// Offending property name, when one could be determined; used to
    /// anchor the diagnostic to a line
    pub property: Option<String>,
}

/// Fetches, caches, and evaluates the top-level pipeline schema.
pub struct PipelineSchemaClient {
    http: reqwest::Client,
    url: String,
    compiled: RwLock<Option<Arc<JSONSchema>>>,
}

impl PipelineSchemaClient {
    pub fn new() -> Self {
        Self::with_url(PIPELINE_SCHEMA_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            http: crate::http_client(),
            url: url.into(),
            compiled: RwLock::new(None),
        }
    }

    /// Validate the JSON projection of a pipeline. `Ok(None)` means the
    /// document conforms to the schema.
    pub async fn validate(&self, json_bytes: &[u8]) -> Result<Option<ValidationIssue>, SchemaError> {
        let schema = self.compiled_schema().await?;
        let instance: Value = serde_json::from_slice(json_bytes)?;

        let candidates = match schema.validate(&instance) {
            Ok(()) => return Ok(None),
            Err(errors) => errors.flat_map(|error| candidates_for(&error)).collect(),
        };

        Ok(select_primary(candidates))
    }

    async fn compiled_schema(&self) -> Result<Arc<JSONSchema>, SchemaError> {
        {
            let guard = self.compiled.read().await;
            if let Some(schema) = guard.as_ref() {
                return Ok(schema.clone());
            }
        }

        let mut guard = self.compiled.write().await;
        // Another task may have compiled while we waited for the lock.
        if let Some(schema) = guard.as_ref() {
            return Ok(schema.clone());
        }

        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(SchemaError::Fetch(format!("HTTP {}", response.status())));
        }
        let body = response.bytes().await?;

        let schema_value: Value = serde_json::from_slice(&body)?;
        let schema = JSONSchema::compile(&schema_value)
            .map_err(|error| SchemaError::Compile(error.to_string()))?;

        let schema = Arc::new(schema);
        *guard = Some(schema.clone());
        Ok(schema)
    }
}

impl Default for PipelineSchemaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A validation error reduced to the parts the message templates need.
#[derive(Debug, Clone)]
pub(crate) struct ErrorCandidate {
    pub(crate) keyword: ErrorKeyword,
    pub(crate) field_path: String,
    pub(crate) description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ErrorKeyword {
    AdditionalPropertyNotAllowed,
    Required,
    InvalidType { expected: String },
    Enum,
    StringGte { limit: u64 },
    StringLte { limit: u64 },
    ArrayMinItems { limit: u64 },
    ArrayMaxItems { limit: u64 },
    NumberGte { limit: String },
    NumberLte { limit: String },
    Other,
}

impl ErrorKeyword {
    /// Lower is more actionable.
    fn priority(&self) -> u32 {
        match self {
            Self::AdditionalPropertyNotAllowed => 1,
            Self::Required => 2,
            Self::InvalidType { .. } => 3,
            Self::Enum => 4,
            Self::StringGte { .. } => 5,
            Self::StringLte { .. } => 6,
            Self::ArrayMinItems { .. } => 7,
            Self::ArrayMaxItems { .. } => 8,
            Self::NumberGte { .. } => 9,
            Self::NumberLte { .. } => 10,
            Self::Other => 999,
        }
    }
}

fn candidates_for(error: &jsonschema::ValidationError<'_>) -> Vec<ErrorCandidate> {
    let field_path = pointer_to_field_path(&error.instance_path);

    match &error.kind {
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
            .iter()
            .map(|property| ErrorCandidate {
                keyword: ErrorKeyword::AdditionalPropertyNotAllowed,
                field_path: field_path.clone(),
                description: format!("Additional property {property} is not allowed"),
            })
            .collect(),
        ValidationErrorKind::Required { property } => {
            let property = property.as_str().unwrap_or_default();
            let field_path = if field_path.is_empty() {
                property.to_string()
            } else {
                format!("{field_path}.{property}")
            };
            vec![ErrorCandidate {
                keyword: ErrorKeyword::Required,
                field_path,
                description: error.to_string(),
            }]
        }
        ValidationErrorKind::Type { kind } => {
            let expected = match kind {
                TypeKind::Single(ty) => ty.to_string(),
                TypeKind::Multiple(types) => (*types)
                    .into_iter()
                    .map(|ty| ty.to_string())
                    .collect::<Vec<_>>()
                    .join(" or "),
            };
            vec![ErrorCandidate {
                keyword: ErrorKeyword::InvalidType { expected },
                field_path,
                description: error.to_string(),
            }]
        }
        ValidationErrorKind::Enum { .. } => vec![ErrorCandidate {
            keyword: ErrorKeyword::Enum,
            field_path,
            description: error.to_string(),
        }],
        ValidationErrorKind::MinLength { limit } => vec![ErrorCandidate {
            keyword: ErrorKeyword::StringGte { limit: *limit },
            field_path,
            description: error.to_string(),
        }],
        ValidationErrorKind::MaxLength { limit } => vec![ErrorCandidate {
            keyword: ErrorKeyword::StringLte { limit: *limit },
            field_path,
            description: error.to_string(),
        }],
        ValidationErrorKind::MinItems { limit } => vec![ErrorCandidate {
            keyword: ErrorKeyword::ArrayMinItems { limit: *limit },
            field_path,
            description: error.to_string(),
        }],
        ValidationErrorKind::MaxItems { limit } => vec![ErrorCandidate {
            keyword: ErrorKeyword::ArrayMaxItems { limit: *limit },
            field_path,
            description: error.to_string(),
        }],
        ValidationErrorKind::Minimum { limit } | ValidationErrorKind::ExclusiveMinimum { limit } => {
            vec![ErrorCandidate {
                keyword: ErrorKeyword::NumberGte {
                    limit: limit.to_string(),
                },
                field_path,
                description: error.to_string(),
            }]
        }
        ValidationErrorKind::Maximum { limit } | ValidationErrorKind::ExclusiveMaximum { limit } => {
            vec![ErrorCandidate {
                keyword: ErrorKeyword::NumberLte {
                    limit: limit.to_string(),
                },
                field_path,
                description: error.to_string(),
            }]
        }
        _ => vec![ErrorCandidate {
            keyword: ErrorKeyword::Other,
            field_path,
            description: error.to_string(),
        }],
    }
}

fn pointer_to_field_path(pointer: &jsonschema::paths::JSONPointer) -> String {
    use jsonschema::paths::PathChunk;

    pointer
        .iter()
        .map(|chunk| match chunk {
            PathChunk::Property(name) => name.to_string(),
            PathChunk::Index(index) => index.to_string(),
            PathChunk::Keyword(keyword) => keyword.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Choose the single primary error: smallest priority wins, ties broken
/// by natural iteration order.
pub(crate) fn select_primary(candidates: Vec<ErrorCandidate>) -> Option<ValidationIssue> {
    let mut best: Option<&ErrorCandidate> = None;
    for candidate in &candidates {
        let better = match best {
            Some(current) => candidate.keyword.priority() < current.keyword.priority(),
            None => true,
        };
        if better {
            best = Some(candidate);
        }
    }

    best.map(render_issue)
}

fn render_issue(candidate: &ErrorCandidate) -> ValidationIssue {
    let leaf = extract_field_name(&candidate.field_path);

    match &candidate.keyword {
        ErrorKeyword::AdditionalPropertyNotAllowed => {
            let property = extract_property_from_description(&candidate.description);
            if property.is_empty() {
                ValidationIssue {
                    message: candidate.description.clone(),
                    property: None,
                }
            } else {
                ValidationIssue {
                    message: format!("Unknown property '{property}' is not allowed"),
                    property: Some(property),
                }
            }
        }
        ErrorKeyword::Required => ValidationIssue {
            message: format!("Missing required property '{leaf}'"),
            property: Some(leaf),
        },
        ErrorKeyword::InvalidType { expected } => ValidationIssue {
            message: format!("Property '{leaf}' has wrong type (expected {expected})"),
            property: Some(leaf),
        },
        ErrorKeyword::Enum => ValidationIssue {
            message: format!("Property '{leaf}' must be one of the allowed values"),
            property: Some(leaf),
        },
        ErrorKeyword::StringGte { limit } => ValidationIssue {
            message: format!("Property '{leaf}' is too short (minimum length {limit})"),
            property: Some(leaf),
        },
        ErrorKeyword::StringLte { limit } => ValidationIssue {
            message: format!("Property '{leaf}' is too long (maximum length {limit})"),
            property: Some(leaf),
        },
        ErrorKeyword::ArrayMinItems { limit } => ValidationIssue {
            message: format!("Property '{leaf}' has too few items (minimum {limit})"),
            property: Some(leaf),
        },
        ErrorKeyword::ArrayMaxItems { limit } => ValidationIssue {
            message: format!("Property '{leaf}' has too many items (maximum {limit})"),
            property: Some(leaf),
        },
        ErrorKeyword::NumberGte { limit } => ValidationIssue {
            message: format!("Property '{leaf}' is too small (minimum {limit})"),
            property: Some(leaf),
        },
        ErrorKeyword::NumberLte { limit } => ValidationIssue {
            message: format!("Property '{leaf}' is too large (maximum {limit})"),
            property: Some(leaf),
        },
        ErrorKeyword::Other => ValidationIssue {
            message: candidate.description.clone(),
            property: if leaf.is_empty() { None } else { Some(leaf) },
        },
    }
}

/// Extract the offending property name from descriptions of the form
/// `Additional property <P> is not allowed`.
pub(crate) fn extract_property_from_description(description: &str) -> String {
    const PREFIX: &str = "Additional property ";
    const SUFFIX: &str = " is not allowed";

    let Some(rest) = description.strip_prefix(PREFIX) else {
        return String::new();
    };
    let Some(property) = rest.strip_suffix(SUFFIX) else {
        return String::new();
    };

    property.trim().to_string()
}

/// Last non-numeric segment of a dot-separated field path. Numeric array
/// indices are skipped; an all-numeric path is returned whole.
pub(crate) fn extract_field_name(field_path: &str) -> String {
    if field_path.is_empty() {
        return String::new();
    }

    for segment in field_path.rsplit('.') {
        if !segment.chars().all(|ch| ch.is_ascii_digit()) {
            return segment.to_string();
        }
    }

    field_path.to_string()
}
