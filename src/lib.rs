//! # logstash-doc: Event-to-Document Transformation
//!
//! Converts pipeline events (an opaque body plus string headers) into
//! LogStash-style documents ready for indexing in a search engine.
//!
//! ## Features
//!
//! - **Reserved fields**: `message`, `timestamp`, `source`, `type`, `host` and
//!   `src_path` headers become `@message`, `@timestamp`, `@source`, `@type`,
//!   `@source_host` and `@source_path`
//! - **Custom fields**: everything else goes under `@fields`, or to the top
//!   level with `removeFieldsPrefix`
//! - **Object fields**: configured headers holding JSON are indexed as objects
//! - **Collation**: `params.cmd` and `params.email` become one `params` object
//!   with `collateObjects`
//! - **Document ids**: a digest of the serialized document, for idempotent
//!   indexing
//!
//! ## Example
//!
//! ```
//! use logstash_doc::{Event, LogStashSerializer, SerializerConfig};
//! use std::collections::HashMap;
//!
//! let mut context = HashMap::new();
//! context.insert("collateObjects".to_string(), "true".to_string());
//! let serializer = LogStashSerializer::new(SerializerConfig::from_context(&context));
//!
//! let event = Event::with_body("login")
//!     .header("host", "web-1")
//!     .header("params.user", "jordan");
//!
//! let document = serializer.build_document(&event).unwrap();
//! assert_eq!(
//!     String::from_utf8(document).unwrap(),
//!     r#"{"@message":"login","@source_host":"web-1","@fields":{"params":{"user":"jordan"}}}"#
//! );
//! ```

pub mod builder;
pub mod collate;
pub mod config;
pub mod content;
pub mod document_id;
pub mod event;
pub mod index_request;
pub mod serializer;

// Re-export key types
pub use builder::{BuilderError, DocumentBuilder};
pub use collate::{Collator, Node};
pub use config::{ConfigError, SerializerConfig};
pub use content::{ContentError, ContentFormat, FieldContent};
pub use document_id::{DigestAlgorithm, DocumentId, DocumentIdBuilder};
pub use event::Event;
pub use index_request::{IndexRequest, IndexRequestFactory};
pub use serializer::{LogStashSerializer, ReservedField, TransformError, RESERVED_FIELDS};
