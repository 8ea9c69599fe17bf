//! LogStash-style event serializer.
//!
//! Turns an [`Event`] into the document layout LogStash uses:
//!
//! ```text
//! {
//!    "@message": "the original plain-text message",
//!    "@timestamp": "2010-12-21T21:48:33.309Z",
//!    "@source": "source of the event",
//!    "@type": "string",
//!    "@source_host": "",
//!    "@source_path": "",
//!    "@fields": {
//!       "user": "jordan",
//!       "command": "shutdown -r"
//!    }
//! }
//! ```
//!
//! Reserved headers are promoted to the `@`-prefixed fields above, as long as
//! the corresponding output field is not already present. Every other header
//! is a custom field, nested under `@fields` unless the prefix is removed.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;

use crate::builder::{BuilderError, DocumentBuilder};
use crate::collate::{Collator, Node};
use crate::config::SerializerConfig;
use crate::content::{interpret, FieldContent};
use crate::event::Event;

/// Container for custom fields
pub const FIELDS_CONTAINER: &str = "@fields";
/// Synthetic object-field name for the event body
pub const BODY_FIELD: &str = "body";

/// A header that is promoted to a reserved top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedField {
    pub header: &'static str,
    pub output: &'static str,
}

pub const MESSAGE: ReservedField = ReservedField { header: "message", output: "@message" };
pub const TIMESTAMP: ReservedField = ReservedField { header: "timestamp", output: "@timestamp" };

/// Reserved fields in emission order.
pub const RESERVED_FIELDS: [ReservedField; 6] = [
    MESSAGE,
    TIMESTAMP,
    ReservedField { header: "source", output: "@source" },
    ReservedField { header: "type", output: "@type" },
    ReservedField { header: "host", output: "@source_host" },
    ReservedField { header: "src_path", output: "@source_path" },
];

/// Look up the reserved field for a header name.
pub fn reserved_for_header(header: &str) -> Option<&'static ReservedField> {
    RESERVED_FIELDS.iter().find(|f| f.header == header)
}

/// Error type for event transformation
#[derive(Debug)]
pub enum TransformError {
    InvalidTimestamp {
        value: String,
        source: ParseIntError,
    },
    TimestampOutOfRange(i64),
    BuilderError(BuilderError),
}

impl From<BuilderError> for TransformError {
    fn from(err: BuilderError) -> Self {
        TransformError::BuilderError(err)
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::InvalidTimestamp { value, source } => {
                write!(f, "Invalid timestamp '{}': {}", value, source)
            }
            TransformError::TimestampOutOfRange(millis) => {
                write!(f, "Timestamp {} is out of range", millis)
            }
            TransformError::BuilderError(e) => write!(f, "Document builder error: {}", e),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::InvalidTimestamp { source, .. } => Some(source),
            TransformError::BuilderError(e) => Some(e),
            TransformError::TimestampOutOfRange(_) => None,
        }
    }
}

/// Parse a header timestamp: milliseconds since the epoch.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TransformError> {
    let millis: i64 = value.parse().map_err(|source| TransformError::InvalidTimestamp {
        value: value.to_string(),
        source,
    })?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(TransformError::TimestampOutOfRange(millis))
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Serializes events into LogStash-style documents.
///
/// Holds only the immutable configuration, so one serializer can be shared
/// across threads.
///
/// With `collateObjects`, a scalar header whose name is a path prefix of
/// another header (`a` next to `a.b`) is dropped in favor of the collated
/// object.
#[derive(Debug, Clone, Default)]
pub struct LogStashSerializer {
    config: SerializerConfig,
}

impl LogStashSerializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Serialize an event into document bytes.
    ///
    /// The whole event fails on a non-numeric `timestamp` header; there is
    /// no partial document.
    pub fn build_document(&self, event: &Event) -> Result<Vec<u8>, TransformError> {
        let mut builder = DocumentBuilder::new();
        builder.start_object()?;
        self.append_headers(&mut builder, event)?;
        builder.end_object()?;
        Ok(builder.finish()?)
    }

    fn append_headers(
        &self,
        builder: &mut DocumentBuilder,
        event: &Event,
    ) -> Result<(), TransformError> {
        let mut headers: BTreeMap<&str, &str> = event
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut emitted = Vec::with_capacity(RESERVED_FIELDS.len());
        self.append_message(builder, event, &mut headers)?;
        emitted.push(MESSAGE.output);
        for field in &RESERVED_FIELDS[1..] {
            if self.append_reserved(builder, field, &mut headers)? {
                emitted.push(field.output);
            }
        }

        // Top-level custom fields must not repeat a reserved field.
        if self.config.remove_fields_prefix {
            headers.retain(|key, _| {
                let shadowed = emitted.iter().any(|output| output == key);
                if shadowed {
                    tracing::debug!("Dropping header '{}', the reserved field is already set", key);
                }
                !shadowed
            });
        }

        self.append_custom_fields(builder, &headers)
    }

    /// `@message` comes from the `message` header when it can be promoted,
    /// otherwise from the body.
    fn append_message(
        &self,
        builder: &mut DocumentBuilder,
        event: &Event,
        headers: &mut BTreeMap<&str, &str>,
    ) -> Result<(), TransformError> {
        let content = match promotable(headers, &MESSAGE) {
            Some(message) => {
                headers.remove(MESSAGE.header);
                interpret(message.as_bytes(), self.config.is_object_field(MESSAGE.header))
            }
            None => interpret(&event.body, self.config.is_object_field(BODY_FIELD)),
        };
        Ok(append_content(builder, MESSAGE.output, content)?)
    }

    /// Promote a reserved header. Returns whether the reserved field was written.
    fn append_reserved(
        &self,
        builder: &mut DocumentBuilder,
        field: &ReservedField,
        headers: &mut BTreeMap<&str, &str>,
    ) -> Result<bool, TransformError> {
        let Some(value) = promotable(headers, field) else {
            return Ok(false);
        };

        if *field == TIMESTAMP {
            let date = parse_timestamp(value)?;
            builder.date_field(field.output, &date)?;
        } else {
            let content = interpret(value.as_bytes(), self.config.is_object_field(field.header));
            append_content(builder, field.output, content)?;
        }
        headers.remove(field.header);
        Ok(true)
    }

    fn append_custom_fields(
        &self,
        builder: &mut DocumentBuilder,
        headers: &BTreeMap<&str, &str>,
    ) -> Result<(), TransformError> {
        if !self.config.remove_fields_prefix {
            builder.start_named_object(FIELDS_CONTAINER)?;
        }

        if self.config.collate_objects {
            let mut collator = Collator::new(&self.config.object_fields);
            collator.collect_all(headers.iter().map(|(k, v)| (*k, *v)));
            for (name, node) in collator.into_fields() {
                match node {
                    Node::Leaf(value) => {
                        let content =
                            interpret(value.as_bytes(), self.config.is_object_field(&name));
                        append_content(builder, &name, content)?;
                    }
                    other => append_node(builder, &name, &other)?,
                }
            }
        } else {
            for (key, value) in headers {
                let content = interpret(value.as_bytes(), self.config.is_object_field(key));
                append_content(builder, key, content)?;
            }
        }

        if !self.config.remove_fields_prefix {
            builder.end_object()?;
        }
        Ok(())
    }
}

fn non_blank<'h>(headers: &BTreeMap<&str, &'h str>, key: &str) -> Option<&'h str> {
    headers.get(key).copied().filter(|v| !is_blank(v))
}

/// The header value to promote, unless the output key was set upstream.
/// An upstream output key leaves both headers as custom fields.
fn promotable<'h>(headers: &BTreeMap<&str, &'h str>, field: &ReservedField) -> Option<&'h str> {
    match non_blank(headers, field.output) {
        Some(_) => None,
        None => non_blank(headers, field.header),
    }
}

fn append_content(
    builder: &mut DocumentBuilder,
    name: &str,
    content: FieldContent,
) -> Result<(), BuilderError> {
    match content {
        FieldContent::Scalar(text) => builder.field(name, &text)?,
        FieldContent::Object(map) => builder.map_field(name, &map)?,
    };
    Ok(())
}

fn append_node(builder: &mut DocumentBuilder, name: &str, node: &Node) -> Result<(), BuilderError> {
    match node {
        Node::Leaf(text) => {
            builder.field(name, text)?;
        }
        Node::Value(value) => {
            builder.value_field(name, value)?;
        }
        Node::Object(children) => {
            builder.start_named_object(name)?;
            for (child_name, child) in children {
                append_node(builder, child_name, child)?;
            }
            builder.end_object()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn serialize(serializer: &LogStashSerializer, event: &Event) -> Value {
        let bytes = serializer.build_document(event).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_body_is_message_without_header() {
        let doc = serialize(&LogStashSerializer::default(), &Event::with_body("test body"));
        assert_eq!(doc, json!({"@message": "test body", "@fields": {}}));
    }

    #[test]
    fn test_message_header_wins_over_body() {
        let event = Event::with_body("body").header("message", "from header");
        let doc = serialize(&LogStashSerializer::default(), &event);

        assert_eq!(doc["@message"], json!("from header"));
        assert_eq!(doc["@fields"], json!({}));
    }

    #[test]
    fn test_blank_message_header_falls_back_to_body() {
        let event = Event::with_body("body").header("message", "   ");
        let doc = serialize(&LogStashSerializer::default(), &event);

        assert_eq!(doc["@message"], json!("body"));
        assert_eq!(doc["@fields"], json!({"message": "   "}));
    }

    #[test]
    fn test_body_parsed_when_object_field() {
        let mut config = SerializerConfig::default();
        config.object_fields.insert(BODY_FIELD.to_string());
        let event = Event::with_body(r#"{"user":"jordan"}"#);

        let doc = serialize(&LogStashSerializer::new(config), &event);
        assert_eq!(doc["@message"], json!({"user": "jordan"}));
    }

    #[test]
    fn test_invalid_body_json_stays_raw() {
        let mut config = SerializerConfig::default();
        config.object_fields.insert(BODY_FIELD.to_string());
        let event = Event::with_body("{flume: somethingnotvalid}");

        let doc = serialize(&LogStashSerializer::new(config), &event);
        assert_eq!(doc["@message"], json!("{flume: somethingnotvalid}"));
    }

    #[test]
    fn test_timestamp_becomes_date() {
        let event = Event::with_body("x").header("timestamp", "1213141516123");
        let doc = serialize(&LogStashSerializer::default(), &event);

        assert_eq!(doc["@timestamp"], json!("2008-06-10T23:45:16.123Z"));
        assert_eq!(doc["@fields"], json!({}));
    }

    #[test]
    fn test_invalid_timestamp_fails_event() {
        let event = Event::with_body("x").header("timestamp", "yesterday");
        let result = LogStashSerializer::default().build_document(&event);

        assert!(matches!(result, Err(TransformError::InvalidTimestamp { .. })));
    }

    #[test]
    fn test_upstream_output_key_skips_promotion() {
        let mut config = SerializerConfig::default();
        config.remove_fields_prefix = true;
        let event = Event::with_body("x")
            .header("type", "raw-type")
            .header("@type", "already-set");

        let bytes = LogStashSerializer::new(config).build_document(&event).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text.matches("\"@type\"").count(), 1);

        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["@type"], json!("already-set"));
        assert_eq!(doc["type"], json!("raw-type"));
    }

    #[test]
    fn test_upstream_message_key_keeps_body() {
        let event = Event::with_body("body")
            .header("@message", "upstream")
            .header("message", "raw");
        let doc = serialize(&LogStashSerializer::default(), &event);

        assert_eq!(doc["@message"], json!("body"));
        assert_eq!(doc["@fields"], json!({"@message": "upstream", "message": "raw"}));
    }

    #[test]
    fn test_upstream_message_key_without_prefix_is_not_repeated() {
        let mut config = SerializerConfig::default();
        config.remove_fields_prefix = true;
        let event = Event::with_body("body").header("@message", "upstream");

        let bytes = LogStashSerializer::new(config).build_document(&event).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"@message":"body"}"#);
    }

    #[test]
    fn test_upstream_timestamp_key_is_not_a_date() {
        let event = Event::with_body("x")
            .header("@timestamp", "yesterday")
            .header("timestamp", "1213141516123");
        let doc = serialize(&LogStashSerializer::default(), &event);

        assert_eq!(doc["@timestamp"], Value::Null);
        assert_eq!(
            doc["@fields"],
            json!({"@timestamp": "yesterday", "timestamp": "1213141516123"})
        );
    }

    #[test]
    fn test_collation_drops_scalar_shadowed_by_path() {
        let mut config = SerializerConfig::default();
        config.collate_objects = true;
        let event = Event::with_body("x").header("a", "x").header("a.b", "y");

        let doc = serialize(&LogStashSerializer::new(config), &event);
        assert_eq!(doc["@fields"], json!({"a": {"b": "y"}}));
    }

    #[test]
    fn test_field_order_is_reserved_then_custom() {
        let event = Event::with_body("m")
            .header("zeta", "z")
            .header("host", "h")
            .header("timestamp", "0")
            .header("alpha", "a");

        let bytes = LogStashSerializer::default().build_document(&event).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"@message":"m","@timestamp":"1970-01-01T00:00:00.000Z","@source_host":"h","@fields":{"alpha":"a","zeta":"z"}}"#
        );
    }

    #[test]
    fn test_reserved_lookup() {
        assert_eq!(reserved_for_header("host").unwrap().output, "@source_host");
        assert_eq!(reserved_for_header("src_path").unwrap().output, "@source_path");
        assert!(reserved_for_header("other").is_none());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("0").unwrap().timestamp_millis(), 0);
        assert!(matches!(
            parse_timestamp(" 12"),
            Err(TransformError::InvalidTimestamp { .. })
        ));
    }
}
