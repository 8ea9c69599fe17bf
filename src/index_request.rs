//! Index request preparation for the delivery layer.
//!
//! Pairs a serialized document with the daily index it belongs to and,
//! optionally, a content-derived id.

use chrono::{DateTime, Utc};

use crate::config::SerializerConfig;
use crate::document_id::{DocumentId, DocumentIdBuilder};
use crate::event::Event;
use crate::serializer::{parse_timestamp, LogStashSerializer, TransformError, TIMESTAMP};

/// Date suffix of index names, always in UTC
const INDEX_DATE_FORMAT: &str = "%Y.%m.%d";

/// Everything the delivery layer needs to index one event.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub index: String,
    pub doc_type: String,
    pub source: Vec<u8>,
    pub id: Option<DocumentId>,
}

/// Builds [`IndexRequest`]s from events.
#[derive(Debug, Clone)]
pub struct IndexRequestFactory {
    serializer: LogStashSerializer,
    id_builder: Option<DocumentIdBuilder>,
}

impl IndexRequestFactory {
    /// Create a factory; ids are generated only when `generate_id` is set.
    pub fn new(config: SerializerConfig) -> Self {
        let id_builder = config
            .generate_id
            .then(|| DocumentIdBuilder::new(config.id_digest.clone()));
        Self {
            serializer: LogStashSerializer::new(config),
            id_builder,
        }
    }

    pub fn serializer(&self) -> &LogStashSerializer {
        &self.serializer
    }

    /// Index name for an event: `<prefix>-yyyy.MM.dd`.
    ///
    /// The date comes from the `timestamp` header when present, otherwise
    /// from the current time.
    pub fn index_name(&self, prefix: &str, event: &Event) -> Result<String, TransformError> {
        let date = match event.headers.get(TIMESTAMP.header) {
            Some(ts) if !ts.trim().is_empty() => parse_timestamp(ts)?,
            _ => Utc::now(),
        };
        Ok(index_name_at(prefix, &date))
    }

    /// Serialize an event and address it.
    pub fn prepare(
        &self,
        prefix: &str,
        doc_type: &str,
        event: &Event,
    ) -> Result<IndexRequest, TransformError> {
        let index = self.index_name(prefix, event)?;
        let source = self.serializer.build_document(event)?;
        let id = self
            .id_builder
            .as_ref()
            .map(|builder| builder.document_id(&source))
            .filter(|id| !id.value.is_empty());

        Ok(IndexRequest {
            index,
            doc_type: doc_type.to_string(),
            source,
            id,
        })
    }
}

/// `<prefix>-yyyy.MM.dd` for a given instant.
pub fn index_name_at(prefix: &str, date: &DateTime<Utc>) -> String {
    format!("{}-{}", prefix, date.format(INDEX_DATE_FORMAT))
}
