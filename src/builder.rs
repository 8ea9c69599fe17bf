//! Streaming document builder.
//!
//! Emits canonical JSON bytes directly from a sequence of start/end/field
//! operations. The output reflects exactly the operations performed, in the
//! order they were performed, so the same sequence always yields the same
//! bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Error type for structural misuse of a [`DocumentBuilder`]
#[derive(Debug)]
pub enum BuilderError {
    /// The document was already serialized
    Sealed,
    /// `end_object` without a matching start
    UnbalancedEnd,
    /// Serialization requested with objects still open
    Unclosed(usize),
    /// Anonymous object started anywhere but at the root
    MisplacedRoot,
    /// Field written with no enclosing object
    NoOpenObject,
    /// Serialization requested before any object was started
    Empty,
    JsonError(serde_json::Error),
}

impl From<serde_json::Error> for BuilderError {
    fn from(err: serde_json::Error) -> Self {
        BuilderError::JsonError(err)
    }
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::Sealed => write!(f, "document already serialized"),
            BuilderError::UnbalancedEnd => write!(f, "end_object without matching start_object"),
            BuilderError::Unclosed(depth) => {
                write!(f, "cannot serialize with {} object(s) still open", depth)
            }
            BuilderError::MisplacedRoot => {
                write!(f, "anonymous object is only allowed as the document root")
            }
            BuilderError::NoOpenObject => write!(f, "field written outside of any object"),
            BuilderError::Empty => write!(f, "document has no root object"),
            BuilderError::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for BuilderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuilderError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

/// Builds one JSON document through nested object operations.
///
/// Every `start_object`/`start_named_object` must be matched by exactly one
/// `end_object` before [`DocumentBuilder::finish`] is called. Once finished,
/// the builder rejects every further operation.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    buf: Vec<u8>,
    /// One entry per open object: `true` once it holds at least one field
    frames: Vec<bool>,
    started: bool,
    sealed: bool,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the root object.
    pub fn start_object(&mut self) -> Result<&mut Self, BuilderError> {
        self.check_open()?;
        if self.started {
            return Err(BuilderError::MisplacedRoot);
        }
        self.started = true;
        self.buf.push(b'{');
        self.frames.push(false);
        Ok(self)
    }

    /// Open a nested object under `name` in the current object.
    pub fn start_named_object(&mut self, name: &str) -> Result<&mut Self, BuilderError> {
        self.write_key(name)?;
        self.buf.push(b'{');
        self.frames.push(false);
        Ok(self)
    }

    /// Close the innermost open object.
    pub fn end_object(&mut self) -> Result<&mut Self, BuilderError> {
        self.check_open()?;
        if self.frames.pop().is_none() {
            return Err(BuilderError::UnbalancedEnd);
        }
        self.buf.push(b'}');
        Ok(self)
    }

    /// Write a string field.
    pub fn field(&mut self, name: &str, value: &str) -> Result<&mut Self, BuilderError> {
        self.write_key(name)?;
        serde_json::to_writer(&mut self.buf, value)?;
        Ok(self)
    }

    /// Write a date field as an ISO-8601 UTC timestamp with milliseconds.
    pub fn date_field(
        &mut self,
        name: &str,
        value: &DateTime<Utc>,
    ) -> Result<&mut Self, BuilderError> {
        let text = value.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.field(name, &text)
    }

    /// Write an array field.
    pub fn array_field(&mut self, name: &str, values: &[Value]) -> Result<&mut Self, BuilderError> {
        self.write_key(name)?;
        serde_json::to_writer(&mut self.buf, values)?;
        Ok(self)
    }

    /// Write a mapping as a nested object, recursing into nested mappings.
    pub fn map_field(
        &mut self,
        name: &str,
        map: &Map<String, Value>,
    ) -> Result<&mut Self, BuilderError> {
        self.start_named_object(name)?;
        for (key, value) in map {
            self.value_field(key, value)?;
        }
        self.end_object()
    }

    /// Write any JSON value; objects go through [`DocumentBuilder::map_field`].
    pub fn value_field(&mut self, name: &str, value: &Value) -> Result<&mut Self, BuilderError> {
        match value {
            Value::Object(map) => self.map_field(name, map),
            Value::String(s) => self.field(name, s),
            other => {
                self.write_key(name)?;
                serde_json::to_writer(&mut self.buf, other)?;
                Ok(self)
            }
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Serialize the document, sealing the builder.
    pub fn finish(&mut self) -> Result<Vec<u8>, BuilderError> {
        self.check_open()?;
        if !self.started {
            return Err(BuilderError::Empty);
        }
        if !self.frames.is_empty() {
            return Err(BuilderError::Unclosed(self.frames.len()));
        }
        self.sealed = true;
        Ok(std::mem::take(&mut self.buf))
    }

    fn check_open(&self) -> Result<(), BuilderError> {
        if self.sealed {
            Err(BuilderError::Sealed)
        } else {
            Ok(())
        }
    }

    fn write_key(&mut self, name: &str) -> Result<(), BuilderError> {
        self.check_open()?;
        let has_fields = self.frames.last_mut().ok_or(BuilderError::NoOpenObject)?;
        if *has_fields {
            self.buf.push(b',');
        }
        *has_fields = true;
        serde_json::to_writer(&mut self.buf, name)?;
        self.buf.push(b':');
        Ok(())
    }
}
