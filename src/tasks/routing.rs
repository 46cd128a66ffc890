//! Router-family tasks: Filter, Distributor, Replicator, Merger, Threader.
//!
//! Routers move messages between slots based on predicates or topology; none
//! of them rewrites document content. Fan-out always deep-clones payloads.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::collaborators::PathEvaluator;
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::reports::FailureReporter;
use crate::slot::Slot;
use crate::tasks::{evaluate, require_payload, take_message, Task, TaskCategory};

/// Forwards messages whose document satisfies a predicate expression; drops
/// the rest silently.
///
/// Drains all available input messages per execution. Fails fast when a
/// message carries no document.
pub struct Filter {
    id: String,
    predicate: String,
    evaluator: Arc<dyn PathEvaluator>,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl Filter {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        predicate: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            predicate: predicate.into(),
            evaluator,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for Filter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        while let Some(message) = self.input.dequeue() {
            let document = require_payload(&self.id, &message)?;
            let verdict = evaluate(&self.id, self.evaluator.as_ref(), document, &self.predicate)?;
            if verdict.is_truthy() {
                self.output.enqueue(message);
            } else {
                trace!(stage = %self.id, message_id = %message.id, "predicate false, dropping");
            }
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Filter {
    fn category(&self) -> TaskCategory {
        TaskCategory::Router
    }
}

/// One content-routing rule: a predicate expression and its destination.
#[derive(Debug)]
pub struct RoutingRule {
    pub predicate: String,
    pub destination: Arc<Slot>,
}

/// Content-based router: first matching rule wins.
///
/// Rules are evaluated in declared order against each input document; the
/// first true predicate receives a deep copy of the message and later rules
/// are not evaluated (first-match-wins, not multi-cast). Unmatched messages go
/// to the default slot when configured, otherwise they are dropped.
pub struct Distributor {
    id: String,
    evaluator: Arc<dyn PathEvaluator>,
    input: Arc<Slot>,
    rules: Vec<RoutingRule>,
    default_slot: Option<Arc<Slot>>,
}

impl std::fmt::Debug for Distributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("rules", &self.rules)
            .field("default_slot", &self.default_slot)
            .finish_non_exhaustive()
    }
}

impl Distributor {
    /// Builds a distributor, pairing predicates with destinations.
    ///
    /// Fails with [`EngineError::SlotArityMismatch`] when the two lists differ
    /// in length.
    pub fn new(
        id: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        input: Arc<Slot>,
        predicates: Vec<String>,
        destinations: Vec<Arc<Slot>>,
        default_slot: Option<Arc<Slot>>,
    ) -> Result<Self, EngineError> {
        let id = id.into();
        if predicates.len() != destinations.len() {
            return Err(EngineError::SlotArityMismatch {
                stage: id,
                rules: predicates.len(),
                destinations: destinations.len(),
            });
        }
        let rules = predicates
            .into_iter()
            .zip(destinations)
            .map(|(predicate, destination)| RoutingRule {
                predicate,
                destination,
            })
            .collect();
        Ok(Self {
            id,
            evaluator,
            input,
            rules,
            default_slot,
        })
    }
}

#[async_trait]
impl Stage for Distributor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        'messages: while let Some(message) = self.input.dequeue() {
            let document = require_payload(&self.id, &message)?;
            for rule in &self.rules {
                let verdict =
                    evaluate(&self.id, self.evaluator.as_ref(), document, &rule.predicate)?;
                if verdict.is_truthy() {
                    rule.destination.enqueue(message.duplicate());
                    continue 'messages;
                }
            }
            match &self.default_slot {
                Some(slot) => slot.enqueue(message),
                None => {
                    trace!(stage = %self.id, message_id = %message.id, "no rule matched, dropping");
                }
            }
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Distributor {
    fn category(&self) -> TaskCategory {
        TaskCategory::Router
    }
}

/// Writes an independently deep-cloned copy of the current input message to
/// every output slot, preserving the original identifier on each copy.
#[derive(Debug)]
pub struct Replicator {
    id: String,
    input: Arc<Slot>,
    outputs: Vec<Arc<Slot>>,
}

impl Replicator {
    /// Fails with [`EngineError::NoOutputSlots`] when `outputs` is empty.
    pub fn new(
        id: impl Into<String>,
        input: Arc<Slot>,
        outputs: Vec<Arc<Slot>>,
    ) -> Result<Self, EngineError> {
        let id = id.into();
        if outputs.is_empty() {
            return Err(EngineError::NoOutputSlots { stage: id });
        }
        Ok(Self { id, input, outputs })
    }
}

#[async_trait]
impl Stage for Replicator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        require_payload(&self.id, &message)?;
        for output in &self.outputs {
            output.enqueue(message.duplicate());
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Replicator {
    fn category(&self) -> TaskCategory {
        TaskCategory::Router
    }
}

/// Funnels every available message from every input into one output.
///
/// Inputs are drained in slot-declaration order; messages pass through
/// unchanged. First-come/first-drained per input — no global ordering across
/// inputs is implied.
pub struct Merger {
    id: String,
    inputs: Vec<Arc<Slot>>,
    output: Arc<Slot>,
}

impl Merger {
    #[must_use]
    pub fn new(id: impl Into<String>, inputs: Vec<Arc<Slot>>, output: Arc<Slot>) -> Self {
        Self {
            id: id.into(),
            inputs,
            output,
        }
    }
}

#[async_trait]
impl Stage for Merger {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        for input in &self.inputs {
            while let Some(message) = input.dequeue() {
                self.output.enqueue(message);
            }
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.inputs.iter().map(|slot| slot.len()).sum())
    }
}

impl Task for Merger {
    fn category(&self) -> TaskCategory {
        TaskCategory::Router
    }
}

/// Fire-and-forget branch: hands a deep clone of the current input message to
/// a wrapped stage on a spawned task and returns immediately.
///
/// The clone is enqueued on the wrapped stage's input (`handoff`) before the
/// spawn, so the sub-task sees it on execution. Failures of the asynchronous
/// branch go to the [`FailureReporter`] and never reach the caller; only a
/// missing input message or document fails synchronously.
pub struct Threader {
    id: String,
    input: Arc<Slot>,
    handoff: Arc<Slot>,
    inner: Arc<dyn Stage>,
    reporter: FailureReporter,
}

impl Threader {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        input: Arc<Slot>,
        handoff: Arc<Slot>,
        inner: Arc<dyn Stage>,
        reporter: FailureReporter,
    ) -> Self {
        Self {
            id: id.into(),
            input,
            handoff,
            inner,
            reporter,
        }
    }
}

#[async_trait]
impl Stage for Threader {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        require_payload(&self.id, &message)?;
        self.handoff.enqueue(message.duplicate());

        let inner = Arc::clone(&self.inner);
        let reporter = self.reporter.clone();
        let threader_id = self.id.clone();
        tokio::spawn(async move {
            if let Err(err) = inner.execute().await {
                reporter.report(format!("{threader_id}/{}", inner.id()), err);
            }
        });
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for Threader {
    fn category(&self) -> TaskCategory {
        TaskCategory::Router
    }
}
