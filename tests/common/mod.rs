//! Shared fixtures for the integration suites.
//!
//! Production wiring injects real path-query and transformation engines; the
//! suites use small closure-based stand-ins covering the expression shapes
//! the engine exercises:
//!
//! - `//name` — node-set of every descendant named `name`
//! - `has://name` — boolean: does such a descendant exist
//! - `attr:key` — text value of the root attribute `key`

use std::sync::Arc;

use async_trait::async_trait;
use ductwork::collaborators::{
    Connector, ConnectorError, PathEvaluator, PathValue, QueryError,
};
use ductwork::document::Document;
use parking_lot::Mutex;

pub fn test_evaluator() -> Arc<dyn PathEvaluator> {
    Arc::new(|doc: &Document, expr: &str| -> Result<PathValue, QueryError> {
        if let Some(name) = expr.strip_prefix("has://") {
            return Ok(PathValue::Bool(!doc.paths_to(name).is_empty()));
        }
        if let Some(name) = expr.strip_prefix("//") {
            return Ok(PathValue::Nodes(doc.paths_to(name)));
        }
        if let Some(key) = expr.strip_prefix("attr:") {
            return match doc.attribute(key) {
                Some(value) => Ok(PathValue::Text(value.to_string())),
                None => Ok(PathValue::Text(String::new())),
            };
        }
        Err(QueryError::msg(format!("unsupported expression '{expr}'")))
    })
}

/// Connector that records every document handed to it.
#[derive(Default)]
pub struct CapturingConnector {
    pub sent: Mutex<Vec<Document>>,
}

#[async_trait]
impl Connector for CapturingConnector {
    async fn call(&self, document: Option<Document>) -> Result<Option<Document>, ConnectorError> {
        if let Some(doc) = document {
            self.sent.lock().push(doc);
        }
        Ok(None)
    }
}

/// Connector that produces a fixed queue of documents, one per call.
pub struct FeedConnector {
    queue: Mutex<Vec<Document>>,
}

impl FeedConnector {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            queue: Mutex::new(documents),
        }
    }
}

#[async_trait]
impl Connector for FeedConnector {
    async fn call(&self, _: Option<Document>) -> Result<Option<Document>, ConnectorError> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            Ok(None)
        } else {
            Ok(Some(queue.remove(0)))
        }
    }
}

pub fn order_with_items(count: usize) -> Document {
    let mut items = Document::element("items");
    for i in 0..count {
        items
            .children
            .push(Document::element("item").with_text(format!("item-{i}")));
    }
    Document::element("order").with_child(items)
}
