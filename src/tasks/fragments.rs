//! Fragmentation patterns: Splitter, Chopper, Assembler, Aggregator.
//!
//! Splitter and Chopper break one document into K fragment messages; the
//! Assembler is the stateful reassembly counterpart to Chopper, tolerating
//! partial and out-of-order arrival. The Aggregator is a one-shot structural
//! wrap with no cross-call state.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::collaborators::PathEvaluator;
use crate::document::Document;
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::message::Message;
use crate::services::DocumentStore;
use crate::slot::Slot;
use crate::tasks::{evaluate, node_set, require_payload, take_message, Task, TaskCategory};

/// Splits a document into one message per matched node.
///
/// The item path expression yields an ordered node-set of K matches; the task
/// emits exactly K messages, fragment `i` carrying matched node `i` as its
/// payload, tagged with 0-based `fragment-index` and `total-fragments`
/// headers, all sharing the original message's identifier. The unmodified
/// original is retained in the injected [`DocumentStore`] under that
/// identifier. Zero matches emit nothing and succeed; a missing document is
/// an error.
pub struct Splitter {
    id: String,
    expression: String,
    evaluator: Arc<dyn PathEvaluator>,
    store: Arc<DocumentStore>,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl Splitter {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        expression: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        store: Arc<DocumentStore>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            evaluator,
            store,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for Splitter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        let document = require_payload(&self.id, &message)?;
        let value = evaluate(&self.id, self.evaluator.as_ref(), document, &self.expression)?;
        let paths = node_set(&self.id, &self.expression, value)?;

        self.store.put(message.id.clone(), document.clone());

        let total = paths.len();
        for (index, path) in paths.iter().enumerate() {
            let node = document
                .node_at(path)
                .ok_or_else(|| EngineError::PathEvaluation {
                    stage: self.id.clone(),
                    expression: self.expression.clone(),
                    message: format!("returned path {path:?} does not resolve"),
                })?;
            let fragment = message.transformed(node.clone()).with_sequence(index, total);
            self.output.enqueue(fragment);
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Splitter {
    fn category(&self) -> TaskCategory {
        TaskCategory::Transformer
    }
}

/// Splits like [`Splitter`] but produces self-describing fragment envelopes.
///
/// Each output document is a fresh `wrapper` root holding a metadata element
/// ([`Chopper::META_ELEMENT`] with `index`, `total`, and `origin` attributes)
/// next to the matched content, so fragments stay independently transportable
/// without external sequence headers.
pub struct Chopper {
    id: String,
    expression: String,
    wrapper: String,
    evaluator: Arc<dyn PathEvaluator>,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl Chopper {
    /// Element name of the embedded metadata block.
    pub const META_ELEMENT: &'static str = "fragment-meta";
    /// Attribute holding the 0-based fragment index.
    pub const INDEX_ATTR: &'static str = "index";
    /// Attribute holding the total fragment count.
    pub const TOTAL_ATTR: &'static str = "total";
    /// Attribute holding the original message identifier.
    pub const ORIGIN_ATTR: &'static str = "origin";

    #[must_use]
    pub fn new(
        id: impl Into<String>,
        expression: impl Into<String>,
        wrapper: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            wrapper: wrapper.into(),
            evaluator,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for Chopper {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        let document = require_payload(&self.id, &message)?;
        let value = evaluate(&self.id, self.evaluator.as_ref(), document, &self.expression)?;
        let paths = node_set(&self.id, &self.expression, value)?;

        let total = paths.len();
        for (index, path) in paths.iter().enumerate() {
            let node = document
                .node_at(path)
                .ok_or_else(|| EngineError::PathEvaluation {
                    stage: self.id.clone(),
                    expression: self.expression.clone(),
                    message: format!("returned path {path:?} does not resolve"),
                })?;
            let meta = Document::element(Self::META_ELEMENT)
                .with_attribute(Self::INDEX_ATTR, index.to_string())
                .with_attribute(Self::TOTAL_ATTR, total.to_string())
                .with_attribute(Self::ORIGIN_ATTR, message.id.clone());
            let envelope = Document::element(self.wrapper.clone())
                .with_child(meta)
                .with_child(node.clone());
            self.output.enqueue(Message::with_id(message.id.clone(), envelope));
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Chopper {
    fn category(&self) -> TaskCategory {
        TaskCategory::Transformer
    }
}

struct PendingSet {
    total: usize,
    fragments: Vec<(usize, Document)>,
}

/// Stateful reassembly counterpart to [`Chopper`].
///
/// Buffers fragments per origin identifier. On the call that completes the
/// declared total, emits a single document whose children are the fragment
/// contents ordered by fragment index ascending — not arrival order — then
/// clears that origin's buffer. An incomplete set is a successful no-emit
/// call.
pub struct Assembler {
    id: String,
    root: String,
    input: Arc<Slot>,
    output: Arc<Slot>,
    buffer: Mutex<FxHashMap<String, PendingSet>>,
}

impl Assembler {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        root: impl Into<String>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            input,
            output,
            buffer: Mutex::new(FxHashMap::default()),
        }
    }

    fn meta_field(&self, meta: &Document, attr: &str) -> Result<String, EngineError> {
        meta.attribute(attr)
            .map(str::to_string)
            .ok_or_else(|| EngineError::MissingStructuralMetadata {
                stage: self.id.clone(),
                detail: format!("metadata block lacks '{attr}' attribute"),
            })
    }

    fn numeric(&self, attr: &str, raw: &str) -> Result<usize, EngineError> {
        raw.parse()
            .map_err(|_| EngineError::MissingStructuralMetadata {
                stage: self.id.clone(),
                detail: format!("metadata attribute '{attr}' is not a number: '{raw}'"),
            })
    }
}

#[async_trait]
impl Stage for Assembler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        let document = require_payload(&self.id, &message)?;

        let meta = document.child_named(Chopper::META_ELEMENT).ok_or_else(|| {
            EngineError::MissingStructuralMetadata {
                stage: self.id.clone(),
                detail: format!("fragment has no '{}' block", Chopper::META_ELEMENT),
            }
        })?;
        let index = self.numeric(
            Chopper::INDEX_ATTR,
            &self.meta_field(meta, Chopper::INDEX_ATTR)?,
        )?;
        let total = self.numeric(
            Chopper::TOTAL_ATTR,
            &self.meta_field(meta, Chopper::TOTAL_ATTR)?,
        )?;
        let origin = self.meta_field(meta, Chopper::ORIGIN_ATTR)?;
        let content = document
            .children
            .iter()
            .find(|c| c.name != Chopper::META_ELEMENT)
            .cloned()
            .ok_or_else(|| EngineError::MissingStructuralMetadata {
                stage: self.id.clone(),
                detail: "fragment envelope carries no content node".to_string(),
            })?;

        let completed = {
            let mut buffer = self.buffer.lock();
            let pending = buffer.entry(origin.clone()).or_insert_with(|| PendingSet {
                total,
                fragments: Vec::new(),
            });
            pending.fragments.push((index, content));
            if pending.fragments.len() >= pending.total {
                buffer.remove(&origin)
            } else {
                None
            }
        };

        if let Some(mut set) = completed {
            set.fragments.sort_by_key(|(index, _)| *index);
            let mut assembled = Document::element(self.root.clone());
            assembled.children = set.fragments.into_iter().map(|(_, doc)| doc).collect();
            self.output.enqueue(Message::with_id(origin, assembled));
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Assembler {
    fn category(&self) -> TaskCategory {
        TaskCategory::Transformer
    }
}

/// One-shot structural wrap: moves all children of a single input document
/// under a new root element, preserving the message identifier.
///
/// Unlike [`Assembler`], this task never buffers across invocations.
pub struct Aggregator {
    id: String,
    wrapper: String,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl Aggregator {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        wrapper: impl Into<String>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            wrapper: wrapper.into(),
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for Aggregator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        let document = require_payload(&self.id, &message)?;
        let mut wrapped = Document::element(self.wrapper.clone());
        wrapped.children = document.children.clone();
        self.output.enqueue(message.transformed(wrapped));
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Aggregator {
    fn category(&self) -> TaskCategory {
        TaskCategory::Transformer
    }
}
