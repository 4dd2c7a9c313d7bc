//! Turning model replies into structured data
//!
//! Two reply shapes matter: the assessor's JSON document and the applier's
//! fenced code block.

use crate::suggest::Suggestion;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

const FENCE: &str = "```";

const SUGGESTION_FIELDS: [&str; 4] = ["explanation", "priority", "reasoning", "suggested_changes"];

/// A reply that is valid JSON but does not match the suggestion schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("reply is valid JSON but not an object")]
    NotAnObject,
    #[error("reply has no \"suggestions\" key")]
    MissingSuggestions,
    #[error("\"suggestions\" must be an array")]
    SuggestionsNotArray,
    #[error("suggestion #{index} is not an object")]
    EntryNotObject { index: usize },
    #[error("suggestion #{index} is missing field \"{field}\"")]
    MissingField { index: usize, field: &'static str },
    #[error("suggestion #{index} has unexpected field \"{field}\"")]
    UnexpectedField { index: usize, field: String },
    #[error("suggestion #{index} field \"{field}\" must be {expected}")]
    WrongType {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

/// Parse an assessment reply.
///
/// A reply that is not JSON at all becomes the single sentinel suggestion
/// carrying the raw text. A JSON reply that breaks the schema is an error.
pub fn parse_suggestions(raw: &str) -> Result<Vec<Suggestion>, SchemaError> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "assessment reply is not valid JSON");
            return Ok(vec![Suggestion::unparsed_reply(raw)]);
        }
    };

    let root = value.as_object().ok_or(SchemaError::NotAnObject)?;
    let entries = root
        .get("suggestions")
        .ok_or(SchemaError::MissingSuggestions)?
        .as_array()
        .ok_or(SchemaError::SuggestionsNotArray)?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let fields = entry
                .as_object()
                .ok_or(SchemaError::EntryNotObject { index })?;
            suggestion_from_fields(index, fields)
        })
        .collect()
}

fn suggestion_from_fields(
    index: usize,
    fields: &Map<String, Value>,
) -> Result<Suggestion, SchemaError> {
    if let Some(extra) = fields
        .keys()
        .find(|key| !SUGGESTION_FIELDS.contains(&key.as_str()))
    {
        return Err(SchemaError::UnexpectedField {
            index,
            field: extra.clone(),
        });
    }

    let priority = required(index, fields, "priority")?;
    let priority = priority
        .as_u64()
        .and_then(|p| u32::try_from(p).ok())
        .ok_or(SchemaError::WrongType {
            index,
            field: "priority",
            expected: "a non-negative integer",
        })?;

    Ok(Suggestion {
        explanation: required_str(index, fields, "explanation")?,
        priority,
        reasoning: required_str(index, fields, "reasoning")?,
        suggested_changes: required_str(index, fields, "suggested_changes")?,
    })
}

fn required<'a>(
    index: usize,
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, SchemaError> {
    fields
        .get(field)
        .ok_or(SchemaError::MissingField { index, field })
}

fn required_str(
    index: usize,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<String, SchemaError> {
    required(index, fields, field)?
        .as_str()
        .map(str::to_string)
        .ok_or(SchemaError::WrongType {
            index,
            field,
            expected: "a string",
        })
}

/// What the applier got back from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    /// The trimmed interior of a fenced code block
    Fenced(String),
    /// No closed fence was found; this is the reply verbatim
    Unstructured(String),
}

impl ExtractedContent {
    pub fn is_fenced(&self) -> bool {
        matches!(self, ExtractedContent::Fenced(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExtractedContent::Fenced(s) | ExtractedContent::Unstructured(s) => s,
        }
    }

    pub fn into_content(self) -> String {
        match self {
            ExtractedContent::Fenced(s) | ExtractedContent::Unstructured(s) => s,
        }
    }
}

/// Pull the file body out of a rewrite reply.
///
/// The payload runs from the line after the first fence (skipping any
/// language tag) to the start of the last fence, trimmed.
pub fn extract_code_block(reply: &str) -> ExtractedContent {
    let unstructured = || ExtractedContent::Unstructured(reply.to_string());

    let (Some(start), Some(end)) = (reply.find(FENCE), reply.rfind(FENCE)) else {
        return unstructured();
    };
    if start == end {
        return unstructured();
    }
    let Some(newline) = reply[start..].find('\n') else {
        return unstructured();
    };
    let code_start = start + newline + 1;
    if code_start > end {
        return unstructured();
    }

    ExtractedContent::Fenced(reply[code_start..end].trim().to_string())
}
