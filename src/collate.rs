//! Collation of dot-notated header names into nested objects.
//!
//! Headers `params.cmd` and `params.timer.start` become
//! `{"params": {"cmd": ..., "timer": {"start": ...}}}`.
//!
//! Conflicts between a plain value and an object at the same name resolve
//! asymmetrically: an existing object always survives a later plain value,
//! unless that name is an object field whose value parses as a mapping, in
//! which case the parsed fields are merged into the object. A dotted key that
//! runs into an existing plain value is kept as a flat, literal field.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::content::try_parse;

/// A node in the collated tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A header value
    Leaf(String),
    /// A non-string value merged in from an embedded document
    Value(Value),
    Object(IndexMap<String, Node>),
}

impl Node {
    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    /// Convert into a plain JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf(s) => Value::String(s.clone()),
            Node::Value(v) => v.clone(),
            Node::Object(children) => Value::Object(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Node::Leaf(s),
            Value::Object(map) => {
                Node::Object(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
            other => Node::Value(other),
        }
    }
}

/// Accumulates headers into a collated tree.
pub struct Collator<'a> {
    object_fields: &'a BTreeSet<String>,
    fields: IndexMap<String, Node>,
}

impl<'a> Collator<'a> {
    pub fn new(object_fields: &'a BTreeSet<String>) -> Self {
        Self {
            object_fields,
            fields: IndexMap::new(),
        }
    }

    /// Collate a whole header set.
    ///
    /// Deeper paths are collected before shallower ones (ties broken by
    /// name), so the outcome never depends on the order the host supplied
    /// the headers in.
    pub fn collect_all<'h, I>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (&'h str, &'h str)>,
    {
        let mut ordered: Vec<_> = headers.into_iter().collect();
        ordered.sort_by(|(a, _), (b, _)| {
            path_depth(b)
                .cmp(&path_depth(a))
                .then_with(|| a.cmp(b))
        });

        for (key, value) in ordered {
            self.collect(key, value);
        }
    }

    /// Collect a single header.
    pub fn collect(&mut self, key: &str, value: &str) {
        collect_into(&mut self.fields, key, value, self.object_fields);
    }

    pub fn into_fields(self) -> IndexMap<String, Node> {
        self.fields
    }
}

/// Number of path segments the collation would create for `key`.
fn path_depth(key: &str) -> usize {
    let mut depth = 1;
    let mut rest = key;
    while let Some(pos) = split_position(rest) {
        depth += 1;
        rest = &rest[pos + 1..];
    }
    depth
}

/// A separator at position 0 does not split; `.hidden` stays a plain name.
fn split_position(key: &str) -> Option<usize> {
    key.find('.').filter(|&pos| pos > 0)
}

fn collect_into(
    fields: &mut IndexMap<String, Node>,
    key: &str,
    value: &str,
    object_fields: &BTreeSet<String>,
) {
    let Some(pos) = split_position(key) else {
        collect_leaf(fields, key, value, object_fields);
        return;
    };

    let head = &key[..pos];
    let rest = &key[pos + 1..];

    if matches!(fields.get(head), Some(node) if !node.is_object()) {
        tracing::debug!("'{}' already holds a value, keeping '{}' as a flat field", head, key);
        fields.insert(key.to_string(), Node::Leaf(value.to_string()));
        return;
    }

    let node = fields
        .entry(head.to_string())
        .or_insert_with(|| Node::Object(IndexMap::new()));
    if let Node::Object(children) = node {
        collect_into(children, rest, value, object_fields);
    }
}

fn collect_leaf(
    fields: &mut IndexMap<String, Node>,
    key: &str,
    value: &str,
    object_fields: &BTreeSet<String>,
) {
    match fields.get_mut(key) {
        Some(Node::Object(children)) => {
            if !object_fields.contains(key) {
                tracing::debug!("Dropping value of '{}' in favor of collated object", key);
                return;
            }
            match try_parse(value) {
                Some(parsed) => {
                    for (k, v) in parsed {
                        children.insert(k, Node::from(v));
                    }
                }
                None => {
                    tracing::debug!("Dropping unparseable value of '{}' in favor of collated object", key);
                }
            }
        }
        _ => {
            fields.insert(key.to_string(), Node::Leaf(value.to_string()));
        }
    }
}
