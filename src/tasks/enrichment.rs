//! Document pruning and enrichment: Slimmer, ContextSlimmer, ContextEnricher.
//!
//! The slimmer pair removes subtrees addressed by a path expression — static
//! for [`Slimmer`], read at runtime from a paired context document for
//! [`ContextSlimmer`]. [`ContextEnricher`] goes the other way, grafting a
//! content fragment from the context document into the data document and
//! tagging the insertion with provenance.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::trace;

use crate::collaborators::PathEvaluator;
use crate::document::Document;
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::slot::Slot;
use crate::tasks::{evaluate, node_set, require_payload, take_message, Task, TaskCategory};

/// Fixed context-document field holding a dynamic path expression.
pub const XPATH_FIELD: &str = "xpath";
/// Fixed context-document field holding a content fragment.
pub const BODY_FIELD: &str = "body";

/// Provenance attribute naming the task that inserted a node.
pub const ENRICHED_BY_ATTR: &str = "enriched-by";
/// Provenance attribute holding the RFC3339 insertion timestamp.
pub const ENRICHED_AT_ATTR: &str = "enriched-at";

fn context_expression<'d>(stage: &str, context: &'d Document) -> Result<&'d str, EngineError> {
    context
        .child_text(XPATH_FIELD)
        .ok_or_else(|| EngineError::MissingStructuralMetadata {
            stage: stage.to_string(),
            detail: format!("context document lacks '{XPATH_FIELD}' field"),
        })
}

/// Removes the subtree matched by a fixed path expression.
///
/// Drains all queued input messages. For each, the expression is evaluated
/// against a clone of the document; on a match the first matched subtree is
/// removed and a new message (same id and headers) is forwarded. No match
/// drops the message without output. A payload-less message is an error.
pub struct Slimmer {
    id: String,
    expression: String,
    evaluator: Arc<dyn PathEvaluator>,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl Slimmer {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        expression: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            evaluator,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for Slimmer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        while let Some(message) = self.input.dequeue() {
            let document = require_payload(&self.id, &message)?;
            let value = evaluate(&self.id, self.evaluator.as_ref(), document, &self.expression)?;
            let paths = node_set(&self.id, &self.expression, value)?;
            match paths.first() {
                Some(path) => {
                    let mut slimmed = document.clone();
                    slimmed.remove_at(path);
                    self.output.enqueue(message.transformed(slimmed));
                }
                None => {
                    trace!(stage = %self.id, message_id = %message.id, "no match, dropping");
                }
            }
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Slimmer {
    fn category(&self) -> TaskCategory {
        TaskCategory::Modifier
    }
}

/// Removes a subtree addressed by a path expression carried in a paired
/// context document.
///
/// Processes aligned pairs while both inputs have messages queued. The
/// dynamic expression is read from the context document's fixed
/// [`XPATH_FIELD`] and evaluated against the data document; the matched node
/// is removed from a clone and the result forwarded under the data message's
/// identity. Missing payloads, an absent `xpath` field, or an unresolvable
/// dynamic node are errors.
pub struct ContextSlimmer {
    id: String,
    evaluator: Arc<dyn PathEvaluator>,
    data_input: Arc<Slot>,
    context_input: Arc<Slot>,
    output: Arc<Slot>,
}

impl ContextSlimmer {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        data_input: Arc<Slot>,
        context_input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            evaluator,
            data_input,
            context_input,
            output,
        }
    }
}

#[async_trait]
impl Stage for ContextSlimmer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        while self.data_input.has_message() && self.context_input.has_message() {
            let data_message = take_message(&self.id, &self.data_input)?;
            let context_message = take_message(&self.id, &self.context_input)?;
            let data = require_payload(&self.id, &data_message)?;
            let context = require_payload(&self.id, &context_message)?;

            let expression = context_expression(&self.id, context)?;
            let value = evaluate(&self.id, self.evaluator.as_ref(), data, expression)?;
            let paths = node_set(&self.id, expression, value)?;
            let path = paths.first().ok_or_else(|| EngineError::PathEvaluation {
                stage: self.id.clone(),
                expression: expression.to_string(),
                message: "dynamically-specified node not found in data document".to_string(),
            })?;

            let mut slimmed = data.clone();
            slimmed.remove_at(path);
            self.output.enqueue(data_message.transformed(slimmed));
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.data_input.len().min(self.context_input.len()))
    }
}

impl Task for ContextSlimmer {
    fn category(&self) -> TaskCategory {
        TaskCategory::Modifier
    }
}

/// Grafts a content fragment from a context document into the data document.
///
/// The target location comes from the context's fixed [`XPATH_FIELD`], the
/// fragment from the first child of its [`BODY_FIELD`] element. The fragment
/// is appended as a child at the target in a clone of the data document and
/// tagged with provenance attributes (enriching task id, RFC3339 timestamp).
/// Errors: missing payload on either input, absent `xpath` or `body` fields,
/// empty `body`, or an unresolvable target.
pub struct ContextEnricher {
    id: String,
    evaluator: Arc<dyn PathEvaluator>,
    data_input: Arc<Slot>,
    context_input: Arc<Slot>,
    output: Arc<Slot>,
}

impl ContextEnricher {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        data_input: Arc<Slot>,
        context_input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            evaluator,
            data_input,
            context_input,
            output,
        }
    }
}

#[async_trait]
impl Stage for ContextEnricher {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let data_message = take_message(&self.id, &self.data_input)?;
        let context_message = take_message(&self.id, &self.context_input)?;
        let data = require_payload(&self.id, &data_message)?;
        let context = require_payload(&self.id, &context_message)?;

        let expression = context_expression(&self.id, context)?;
        let body = context.child_named(BODY_FIELD).ok_or_else(|| {
            EngineError::MissingStructuralMetadata {
                stage: self.id.clone(),
                detail: format!("context document lacks '{BODY_FIELD}' field"),
            }
        })?;
        let mut fragment = body.children.first().cloned().ok_or_else(|| {
            EngineError::MissingStructuralMetadata {
                stage: self.id.clone(),
                detail: format!("'{BODY_FIELD}' field carries no content fragment"),
            }
        })?;

        let value = evaluate(&self.id, self.evaluator.as_ref(), data, expression)?;
        let paths = node_set(&self.id, expression, value)?;
        let target = paths.first().ok_or_else(|| EngineError::PathEvaluation {
            stage: self.id.clone(),
            expression: expression.to_string(),
            message: "enrichment target not found in data document".to_string(),
        })?;

        fragment.set_attribute(ENRICHED_BY_ATTR, self.id.clone());
        fragment.set_attribute(ENRICHED_AT_ATTR, Utc::now().to_rfc3339());

        let mut enriched = data.clone();
        enriched.append_child_at(target, fragment);
        self.output.enqueue(data_message.transformed(enriched));
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.data_input.len().min(self.context_input.len()))
    }
}

impl Task for ContextEnricher {
    fn category(&self) -> TaskCategory {
        TaskCategory::Modifier
    }
}
