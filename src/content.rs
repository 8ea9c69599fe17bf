//! Content detection and parsing for embedded structured values.
//!
//! Header values and event bodies are arbitrary user text. Some of them carry
//! a JSON (or YAML) document; this module decides which ones do and turns
//! them into a mapping. Failures never escape: callers fall back to treating
//! the content as plain text.

use serde_json::{Map, Value};
use std::fmt;

/// Structured formats recognised by [`detect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Yaml,
}

/// Error type for content parsing
#[derive(Debug)]
pub enum ContentError {
    JsonError(serde_json::Error),
    YamlError(serde_yaml::Error),
    /// Content parsed, but the top level is not a mapping
    NotAMapping,
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        ContentError::JsonError(err)
    }
}

impl From<serde_yaml::Error> for ContentError {
    fn from(err: serde_yaml::Error) -> Self {
        ContentError::YamlError(err)
    }
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::JsonError(e) => write!(f, "JSON error: {}", e),
            ContentError::YamlError(e) => write!(f, "YAML error: {}", e),
            ContentError::NotAMapping => write!(f, "content is not a mapping"),
        }
    }
}

impl std::error::Error for ContentError {}

/// How a value ends up in the document: as text or as a nested object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldContent {
    Scalar(String),
    Object(Map<String, Value>),
}

/// Guess the structured format of `data` from its leading bytes.
///
/// A JSON document starts with `{` after optional whitespace, a YAML
/// document with a `---` marker. Anything else is plain content.
pub fn detect(data: &[u8]) -> Option<ContentFormat> {
    let start = data.iter().position(|b| !b.is_ascii_whitespace())?;
    let rest = &data[start..];

    if rest[0] == b'{' {
        Some(ContentFormat::Json)
    } else if rest.starts_with(b"---") {
        Some(ContentFormat::Yaml)
    } else {
        None
    }
}

/// Parse `data` in the given format into a mapping.
pub fn parse(data: &[u8], format: ContentFormat) -> Result<Map<String, Value>, ContentError> {
    let value: Value = match format {
        ContentFormat::Json => serde_json::from_slice(data)?,
        ContentFormat::Yaml => serde_yaml::from_slice(data)?,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ContentError::NotAMapping),
    }
}

/// Detect and parse in one step, swallowing every failure.
pub fn try_parse(data: &str) -> Option<Map<String, Value>> {
    let format = detect(data.as_bytes())?;
    parse(data.as_bytes(), format).ok()
}

/// Decide how `data` is emitted.
///
/// With `allow_object` unset, or when the content is not recognisably
/// structured, the result is the text itself. A recognised format that
/// fails to parse also falls back to text.
pub fn interpret(data: &[u8], allow_object: bool) -> FieldContent {
    if allow_object {
        if let Some(format) = detect(data) {
            match parse(data, format) {
                Ok(map) => return FieldContent::Object(map),
                Err(e) => {
                    tracing::debug!("Falling back to raw text for unparseable {:?}: {}", format, e);
                }
            }
        }
    }
    FieldContent::Scalar(String::from_utf8_lossy(data).into_owned())
}
