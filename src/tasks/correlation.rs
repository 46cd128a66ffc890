//! Correlation tasks: the cross-branch synchronization gate and the
//! process-wide correlation-id stamp.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::collaborators::PathEvaluator;
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::message::Message;
use crate::services::CorrelationIdSource;
use crate::slot::Slot;
use crate::tasks::{evaluate, require_payload, take_message, Task, TaskCategory};

/// Synchronization gate across independently-produced branches.
///
/// Evaluates the correlation-key expression against the head document of every
/// input. Only when all extracted keys are pairwise equal (string equality)
/// are the heads dequeued and forwarded to their corresponding outputs;
/// otherwise everything stays queued and the gate re-checks on the next
/// execution. Typical use: recombining a request with its asynchronously
/// obtained response sharing a correlation id.
pub struct Correlator {
    id: String,
    key_expression: String,
    evaluator: Arc<dyn PathEvaluator>,
    inputs: Vec<Arc<Slot>>,
    outputs: Vec<Arc<Slot>>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("id", &self.id)
            .field("key_expression", &self.key_expression)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl Correlator {
    /// Requires at least two inputs and one output.
    pub fn new(
        id: impl Into<String>,
        key_expression: impl Into<String>,
        evaluator: Arc<dyn PathEvaluator>,
        inputs: Vec<Arc<Slot>>,
        outputs: Vec<Arc<Slot>>,
    ) -> Result<Self, EngineError> {
        let id = id.into();
        if inputs.len() < 2 {
            return Err(EngineError::UnsupportedVariant {
                variant: format!("correlator '{id}' with fewer than two inputs"),
            });
        }
        if outputs.is_empty() {
            return Err(EngineError::NoOutputSlots { stage: id });
        }
        Ok(Self {
            id,
            key_expression: key_expression.into(),
            evaluator,
            inputs,
            outputs,
        })
    }

    fn key_of(&self, message: &Message) -> Result<String, EngineError> {
        let document = require_payload(&self.id, message)?;
        let value = evaluate(
            &self.id,
            self.evaluator.as_ref(),
            document,
            &self.key_expression,
        )?;
        value.key_text().ok_or_else(|| EngineError::PathEvaluation {
            stage: self.id.clone(),
            expression: self.key_expression.clone(),
            message: "node-set result cannot be used as a correlation key".to_string(),
        })
    }
}

#[async_trait]
impl Stage for Correlator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        // Peek first: the gate must not consume anything until all branches
        // have arrived with matching keys.
        let mut heads = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            match input.peek() {
                Some(message) => heads.push(message),
                None => return Ok(()),
            }
        }

        let mut keys = Vec::with_capacity(heads.len());
        for message in &heads {
            keys.push(self.key_of(message)?);
        }
        if !keys.windows(2).all(|pair| pair[0] == pair[1]) {
            trace!(stage = %self.id, ?keys, "correlation keys differ, gate stays closed");
            return Ok(());
        }

        let last_output = self.outputs.len() - 1;
        for (index, input) in self.inputs.iter().enumerate() {
            let message = take_message(&self.id, input)?;
            let output = &self.outputs[index.min(last_output)];
            output.enqueue(message);
        }
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.inputs.iter().map(|slot| slot.len()).sum())
    }
}

impl Task for Correlator {
    fn category(&self) -> TaskCategory {
        TaskCategory::Router
    }
}

/// Stamps the next process-wide correlation id into the `correlation-id`
/// header, leaving the payload untouched.
///
/// The [`CorrelationIdSource`] is shared across all instances wired to it and
/// never issues the same id twice for the life of the process.
pub struct CorrelationIdSetter {
    id: String,
    source: Arc<CorrelationIdSource>,
    input: Arc<Slot>,
    output: Arc<Slot>,
}

impl CorrelationIdSetter {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source: Arc<CorrelationIdSource>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for CorrelationIdSetter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let message = take_message(&self.id, &self.input)?;
        require_payload(&self.id, &message)?;
        let stamped = message.with_header(Message::CORRELATION_ID, self.source.next_id());
        self.output.enqueue(stamped);
        Ok(())
    }

    fn workload_hint(&self) -> Option<usize> {
        Some(self.input.len())
    }
}

impl Task for CorrelationIdSetter {
    fn category(&self) -> TaskCategory {
        TaskCategory::Modifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{PathValue, QueryError};
    use crate::document::Document;

    fn key_attribute_evaluator() -> Arc<dyn PathEvaluator> {
        Arc::new(|doc: &Document, expr: &str| -> Result<PathValue, QueryError> {
            doc.attribute(expr)
                .map(|v| PathValue::Text(v.to_string()))
                .ok_or_else(|| QueryError::msg(format!("no attribute {expr}")))
        })
    }

    fn keyed(name: &str, key: &str) -> Message {
        Message::new(Document::element(name).with_attribute("corr", key))
    }

    #[tokio::test]
    async fn gate_stays_closed_until_all_inputs_have_messages() {
        let left = Slot::new("left");
        let right = Slot::new("right");
        let out = Slot::new("out");
        left.enqueue(keyed("request", "42"));

        let correlator = Correlator::new(
            "c",
            "corr",
            key_attribute_evaluator(),
            vec![Arc::clone(&left), Arc::clone(&right)],
            vec![Arc::clone(&out)],
        )
        .unwrap();

        correlator.execute().await.unwrap();
        assert_eq!(left.len(), 1);
        assert!(out.is_empty());

        right.enqueue(keyed("response", "42"));
        correlator.execute().await.unwrap();
        assert!(left.is_empty());
        assert!(right.is_empty());
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn mismatched_keys_forward_nothing() {
        let left = Slot::new("left");
        let right = Slot::new("right");
        let out = Slot::new("out");
        left.enqueue(keyed("request", "1"));
        right.enqueue(keyed("response", "2"));

        let correlator = Correlator::new(
            "c",
            "corr",
            key_attribute_evaluator(),
            vec![Arc::clone(&left), Arc::clone(&right)],
            vec![Arc::clone(&out)],
        )
        .unwrap();
        correlator.execute().await.unwrap();

        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn matched_inputs_map_to_corresponding_outputs() {
        let inputs: Vec<_> = (0..2).map(|i| Slot::new(format!("in-{i}"))).collect();
        let outputs: Vec<_> = (0..2).map(|i| Slot::new(format!("out-{i}"))).collect();
        inputs[0].enqueue(keyed("a", "k"));
        inputs[1].enqueue(keyed("b", "k"));

        let correlator = Correlator::new(
            "c",
            "corr",
            key_attribute_evaluator(),
            inputs,
            outputs.clone(),
        )
        .unwrap();
        correlator.execute().await.unwrap();

        assert_eq!(outputs[0].dequeue().unwrap().payload.unwrap().name, "a");
        assert_eq!(outputs[1].dequeue().unwrap().payload.unwrap().name, "b");
    }

    #[test]
    fn construction_constraints() {
        let err = Correlator::new(
            "c",
            "corr",
            key_attribute_evaluator(),
            vec![Slot::new("only")],
            vec![Slot::new("out")],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedVariant { .. }));

        let err = Correlator::new(
            "c",
            "corr",
            key_attribute_evaluator(),
            vec![Slot::new("a"), Slot::new("b")],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NoOutputSlots { .. }));
    }

    #[tokio::test]
    async fn setter_stamps_increasing_header_values() {
        let source = CorrelationIdSource::with_width(4);
        let input = Slot::new("in");
        let output = Slot::new("out");
        input.enqueue(Message::new(Document::element("a")));
        input.enqueue(Message::new(Document::element("b")));

        let setter = CorrelationIdSetter::new("set", source, Arc::clone(&input), Arc::clone(&output));
        setter.execute().await.unwrap();
        setter.execute().await.unwrap();

        assert_eq!(
            output.dequeue().unwrap().header(Message::CORRELATION_ID),
            Some("0000")
        );
        assert_eq!(
            output.dequeue().unwrap().header(Message::CORRELATION_ID),
            Some("0001")
        );
    }

    #[tokio::test]
    async fn setter_fails_without_message_or_document() {
        let setter = CorrelationIdSetter::new(
            "set",
            CorrelationIdSource::new(),
            Slot::new("in"),
            Slot::new("out"),
        );
        assert!(matches!(
            setter.execute().await.unwrap_err(),
            EngineError::MissingMessage { .. }
        ));

        let input = Slot::new("in");
        input.enqueue(Message::empty());
        let setter = CorrelationIdSetter::new(
            "set",
            CorrelationIdSource::new(),
            input,
            Slot::new("out"),
        );
        assert!(matches!(
            setter.execute().await.unwrap_err(),
            EngineError::MissingDocument { .. }
        ));
    }
}
