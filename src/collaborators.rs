//! Boundary traits for external collaborators.
//!
//! The core consumes, but never implements, three collaborator contracts: a
//! [`Connector`] that moves documents across a physical boundary (file,
//! console, database, HTTP), a [`PathEvaluator`] that answers path-query
//! expressions against a document tree, and a [`TransformEngine`] that applies
//! declarative transformation scripts. Blanket impls let tests inject plain
//! closures for the two pure contracts.

use async_trait::async_trait;
use thiserror::Error;

use crate::document::{Document, NodePath};

/// Result of evaluating a path expression against a document.
///
/// Node-set results are returned as [`NodePath`] locations rather than copies,
/// so callers can edit the matched subtree (remove it, append under it) in
/// their own clone of the document.
#[derive(Clone, Debug, PartialEq)]
pub enum PathValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Nodes(Vec<NodePath>),
}

impl PathValue {
    /// Truthiness used by predicate tasks: `true`, non-zero, non-empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            PathValue::Bool(b) => *b,
            PathValue::Number(n) => *n != 0.0,
            PathValue::Text(s) => !s.is_empty(),
            PathValue::Nodes(paths) => !paths.is_empty(),
        }
    }

    /// Scalar rendering used for correlation keys. Node-sets have no scalar
    /// form and yield `None`.
    #[must_use]
    pub fn key_text(&self) -> Option<String> {
        match self {
            PathValue::Bool(b) => Some(b.to_string()),
            PathValue::Number(n) => Some(n.to_string()),
            PathValue::Text(s) => Some(s.clone()),
            PathValue::Nodes(_) => None,
        }
    }
}

/// Failure reported by a [`PathEvaluator`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by a [`TransformEngine`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by a [`Connector`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectorError {
    pub message: String,
}

impl ConnectorError {
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Path-query evaluator: expression + document in, scalar or node-set out.
///
/// Used uniformly by Filter, Distributor, Correlator, Splitter, Chopper, and
/// the Slimmer family.
pub trait PathEvaluator: Send + Sync {
    fn evaluate(&self, document: &Document, expression: &str) -> Result<PathValue, QueryError>;
}

impl<F> PathEvaluator for F
where
    F: Fn(&Document, &str) -> Result<PathValue, QueryError> + Send + Sync,
{
    fn evaluate(&self, document: &Document, expression: &str) -> Result<PathValue, QueryError> {
        self(document, expression)
    }
}

/// Declarative-transformation engine: document + script in, new document out.
pub trait TransformEngine: Send + Sync {
    fn apply(&self, document: &Document, script: &str) -> Result<Document, TransformError>;
}

impl<F> TransformEngine for F
where
    F: Fn(&Document, &str) -> Result<Document, TransformError> + Send + Sync,
{
    fn apply(&self, document: &Document, script: &str) -> Result<Document, TransformError> {
        self(document, script)
    }
}

/// Physical boundary adapter.
///
/// `call(None)` asks the connector to produce a document (input side);
/// `call(Some(doc))` hands one over (output side). A request/response
/// connector does both in one call. Synchronous from the port's perspective:
/// the port awaits the call before continuing.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn call(&self, document: Option<Document>) -> Result<Option<Document>, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_predicate_semantics() {
        assert!(PathValue::Bool(true).is_truthy());
        assert!(!PathValue::Bool(false).is_truthy());
        assert!(PathValue::Number(2.0).is_truthy());
        assert!(!PathValue::Number(0.0).is_truthy());
        assert!(PathValue::Text("x".to_string()).is_truthy());
        assert!(!PathValue::Text(String::new()).is_truthy());
        assert!(PathValue::Nodes(vec![vec![0]]).is_truthy());
        assert!(!PathValue::Nodes(vec![]).is_truthy());
    }

    #[test]
    fn key_text_rejects_node_sets() {
        assert_eq!(PathValue::Text("k".to_string()).key_text().as_deref(), Some("k"));
        assert_eq!(PathValue::Bool(true).key_text().as_deref(), Some("true"));
        assert!(PathValue::Nodes(vec![]).key_text().is_none());
    }

    #[test]
    fn closures_implement_the_pure_contracts() {
        let eval = |_: &Document, expr: &str| -> Result<PathValue, QueryError> {
            Ok(PathValue::Text(expr.to_string()))
        };
        let doc = Document::element("d");
        assert_eq!(
            eval.evaluate(&doc, "/a").unwrap(),
            PathValue::Text("/a".to_string())
        );

        let engine = |doc: &Document, _: &str| -> Result<Document, TransformError> {
            Ok(Document::element(format!("t-{}", doc.name)))
        };
        assert_eq!(engine.apply(&doc, "script").unwrap().name, "t-d");
    }
}
