//! Message envelope passed between tasks and ports.
//!
//! A [`Message`] carries a [`Document`] payload, a stable identifier, optional
//! fragment sequence metadata, and a string header map. Identity stays stable
//! across transformations that represent the same unit of work; fan-out tasks
//! deep-clone the payload so no two in-flight messages alias a tree.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Document;

/// Envelope for one unit of in-flight work.
///
/// A `payload` of `None` is a valid carrier (used as an error sentinel by
/// ports); tasks that require a payload fail with
/// [`EngineError::MissingDocument`](crate::errors::EngineError::MissingDocument)
/// rather than dereferencing it.
///
/// # Examples
///
/// ```
/// use ductwork::document::Document;
/// use ductwork::message::Message;
///
/// let msg = Message::new(Document::element("order"));
/// assert!(msg.payload.is_some());
/// assert!(!msg.id.is_empty());
///
/// let tagged = msg.with_header(Message::CORRELATION_ID, "0000000007");
/// assert_eq!(tagged.header(Message::CORRELATION_ID), Some("0000000007"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, shared by every fragment split from this message.
    pub id: String,
    /// Document payload. `None` is a valid error-sentinel carrier.
    pub payload: Option<Document>,
    /// 0-based fragment index within a split sequence.
    #[serde(default)]
    pub sequence_index: usize,
    /// Total number of fragments in the sequence this message belongs to.
    #[serde(default)]
    pub sequence_total: usize,
    /// Transport headers.
    #[serde(default)]
    pub headers: FxHashMap<String, String>,
}

impl Message {
    /// Header carrying the 0-based fragment index set by a Splitter.
    pub const FRAGMENT_INDEX: &'static str = "fragment-index";
    /// Header carrying the total fragment count set by a Splitter.
    pub const TOTAL_FRAGMENTS: &'static str = "total-fragments";
    /// Header carrying the process-wide correlation id.
    pub const CORRELATION_ID: &'static str = "correlation-id";

    /// Creates a message with a fresh UUID identifier and the given payload.
    #[must_use]
    pub fn new(payload: Document) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload: Some(payload),
            ..Default::default()
        }
    }

    /// Creates a payload-less carrier with a fresh identifier.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    /// Creates a message with an explicit identifier, preserving identity
    /// across a transformation of the same unit of work.
    #[must_use]
    pub fn with_id(id: impl Into<String>, payload: Document) -> Self {
        Self {
            id: id.into(),
            payload: Some(payload),
            ..Default::default()
        }
    }

    /// Builder: sets a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builder: sets fragment sequence metadata and the matching headers.
    #[must_use]
    pub fn with_sequence(mut self, index: usize, total: usize) -> Self {
        self.sequence_index = index;
        self.sequence_total = total;
        self.headers
            .insert(Self::FRAGMENT_INDEX.to_string(), index.to_string());
        self.headers
            .insert(Self::TOTAL_FRAGMENTS.to_string(), total.to_string());
        self
    }

    /// Returns the header value for `key`, if present.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Derives a new message carrying `payload` but keeping this message's
    /// identity, headers, and sequence metadata.
    ///
    /// Transformations never mutate a message in place; they produce a new one
    /// through this method.
    #[must_use]
    pub fn transformed(&self, payload: Document) -> Self {
        Self {
            id: self.id.clone(),
            payload: Some(payload),
            sequence_index: self.sequence_index,
            sequence_total: self.sequence_total,
            headers: self.headers.clone(),
        }
    }

    /// Returns an independently owned deep copy, preserving the identifier.
    ///
    /// Used by fan-out tasks; the clone shares no tree nodes with `self`.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_unique_ids() {
        let a = Message::new(Document::element("a"));
        let b = Message::new(Document::element("a"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn with_sequence_mirrors_headers() {
        let msg = Message::new(Document::element("doc")).with_sequence(2, 5);
        assert_eq!(msg.sequence_index, 2);
        assert_eq!(msg.sequence_total, 5);
        assert_eq!(msg.header(Message::FRAGMENT_INDEX), Some("2"));
        assert_eq!(msg.header(Message::TOTAL_FRAGMENTS), Some("5"));
    }

    #[test]
    fn transformed_preserves_identity_and_headers() {
        let msg = Message::new(Document::element("in")).with_header("k", "v");
        let out = msg.transformed(Document::element("out"));
        assert_eq!(out.id, msg.id);
        assert_eq!(out.header("k"), Some("v"));
        assert_eq!(out.payload.unwrap().name, "out");
    }

    #[test]
    fn duplicate_is_deep() {
        let msg = Message::new(Document::element("root").with_child(Document::element("leaf")));
        let mut copy = msg.duplicate();
        assert_eq!(copy.id, msg.id);
        copy.payload.as_mut().unwrap().children.clear();
        assert_eq!(msg.payload.as_ref().unwrap().children.len(), 1);
    }
}
