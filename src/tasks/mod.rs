//! Task taxonomy: single-purpose processing units wired between slots.
//!
//! Every task consumes 1..N input [`Slot`]s and produces 0..N output slots.
//! A task is a function of "whatever is currently queued on its inputs" to
//! "zero or more messages on its outputs"; the [`Assembler`](fragments::Assembler)
//! is the one task with internal buffering state. Tasks own no slots — slots
//! are shared, wired at graph construction, and never reassigned afterwards.
//!
//! # Design
//!
//! Dispatch over task kinds is a flat trait-object model: every task
//! implements [`Stage`] (execution) plus [`Task`] (category), with no
//! inheritance chains. Fan-out tasks deep-clone payloads; no two in-flight
//! messages ever alias a document tree.

pub mod correlation;
pub mod enrichment;
pub mod fragments;
pub mod routing;
pub mod translate;

use crate::collaborators::{PathEvaluator, PathValue};
use crate::document::{Document, NodePath};
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::message::Message;
use crate::slot::Slot;

pub use correlation::{CorrelationIdSetter, Correlator};
pub use enrichment::{ContextEnricher, ContextSlimmer, Slimmer};
pub use fragments::{Aggregator, Assembler, Chopper, Splitter};
pub use routing::{Distributor, Filter, Merger, Replicator, RoutingRule, Threader};
pub use translate::Translator;

/// Broad family a task belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    /// Moves messages between slots without changing documents.
    Router,
    /// Adjusts a message or document in place-for-purpose (headers, pruning).
    Modifier,
    /// Produces structurally new documents.
    Transformer,
}

/// A processing unit in the taxonomy. See the module docs for the contract.
pub trait Task: Stage {
    fn category(&self) -> TaskCategory;
}

/// Dequeues the next message from `slot`, failing when none is queued.
///
/// Used by tasks whose semantics act on "the current input message"; drain-all
/// tasks treat an empty input as a successful no-op instead.
pub(crate) fn take_message(stage: &str, slot: &Slot) -> Result<Message, EngineError> {
    slot.dequeue().ok_or_else(|| EngineError::MissingMessage {
        stage: stage.to_string(),
        slot: slot.id().to_string(),
    })
}

/// Borrows the document payload, failing fast on a payload-less carrier.
pub(crate) fn require_payload<'m>(
    stage: &str,
    message: &'m Message,
) -> Result<&'m Document, EngineError> {
    message
        .payload
        .as_ref()
        .ok_or_else(|| EngineError::MissingDocument {
            stage: stage.to_string(),
            message_id: message.id.clone(),
        })
}

/// Evaluates a path expression, mapping evaluator failures onto the engine
/// error surface with the owning stage named.
pub(crate) fn evaluate(
    stage: &str,
    evaluator: &dyn PathEvaluator,
    document: &Document,
    expression: &str,
) -> Result<PathValue, EngineError> {
    evaluator
        .evaluate(document, expression)
        .map_err(|err| EngineError::PathEvaluation {
            stage: stage.to_string(),
            expression: expression.to_string(),
            message: err.to_string(),
        })
}

/// Narrows a [`PathValue`] to the node-set form required by structural tasks.
pub(crate) fn node_set(
    stage: &str,
    expression: &str,
    value: PathValue,
) -> Result<Vec<NodePath>, EngineError> {
    match value {
        PathValue::Nodes(paths) => Ok(paths),
        other => Err(EngineError::PathEvaluation {
            stage: stage.to_string(),
            expression: expression.to_string(),
            message: format!("expected a node-set, got {other:?}"),
        }),
    }
}
