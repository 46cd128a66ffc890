//! Boundary adapters between external connectors and internal slots.
//!
//! Ports are the only stages that touch a
//! [`Connector`](crate::collaborators::Connector): an [`InputPort`] wraps
//! produced documents as new messages, an [`OutputPort`] hands terminal
//! documents back out, and a [`RequestPort`] drives a request/response round
//! trip while preserving the requesting message's identity and headers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::collaborators::{Connector, TransformEngine};
use crate::document::Document;
use crate::errors::EngineError;
use crate::flow::Stage;
use crate::message::Message;
use crate::slot::Slot;
use crate::tasks::{require_payload, take_message};

fn connector_error(stage: &str, err: impl std::fmt::Display) -> EngineError {
    EngineError::Connector {
        stage: stage.to_string(),
        message: err.to_string(),
    }
}

/// Entry boundary: asks its connector for a document, wraps it as a new
/// [`Message`], and enqueues it on the output slot.
pub struct InputPort {
    id: String,
    connector: Arc<dyn Connector>,
    output: Arc<Slot>,
}

impl InputPort {
    #[must_use]
    pub fn new(id: impl Into<String>, connector: Arc<dyn Connector>, output: Arc<Slot>) -> Self {
        Self {
            id: id.into(),
            connector,
            output,
        }
    }

    /// Wraps an externally supplied document directly, bypassing the
    /// connector. Handy for test harnesses and console drivers.
    pub fn inject(&self, document: Document) {
        self.output.enqueue(Message::new(document));
    }
}

#[async_trait]
impl Stage for InputPort {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        match self
            .connector
            .call(None)
            .await
            .map_err(|err| connector_error(&self.id, err))?
        {
            Some(document) => {
                self.output.enqueue(Message::new(document));
            }
            None => {
                debug!(stage = %self.id, "connector produced no document");
            }
        }
        Ok(())
    }
}

/// Exit boundary: dequeues the next message and hands its document to the
/// connector.
///
/// An empty slot or a payload-less carrier is "nothing to send" — observable
/// in the logs, but not an error.
pub struct OutputPort {
    id: String,
    connector: Arc<dyn Connector>,
    input: Arc<Slot>,
}

impl OutputPort {
    #[must_use]
    pub fn new(id: impl Into<String>, connector: Arc<dyn Connector>, input: Arc<Slot>) -> Self {
        Self {
            id: id.into(),
            connector,
            input,
        }
    }
}

#[async_trait]
impl Stage for OutputPort {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let Some(message) = self.input.dequeue() else {
            debug!(stage = %self.id, "nothing to send: slot empty");
            return Ok(());
        };
        let Some(document) = message.payload else {
            debug!(stage = %self.id, message_id = %message.id, "nothing to send: no document");
            return Ok(());
        };
        self.connector
            .call(Some(document))
            .await
            .map_err(|err| connector_error(&self.id, err))?;
        Ok(())
    }
}

/// Request/response boundary.
///
/// Dequeues a request message (failing when it has no document), retains it,
/// and drives the connector round trip. The response document — optionally
/// rewritten by a transformation script — is wrapped preserving the retained
/// message's identity and headers, then enqueued on the output slot. When the
/// connector answers asynchronously (returns `None`), the retained request
/// stays parked until [`accept_response`](Self::accept_response) delivers the
/// response out-of-band.
pub struct RequestPort {
    id: String,
    connector: Arc<dyn Connector>,
    input: Arc<Slot>,
    output: Arc<Slot>,
    response_transform: Option<(Arc<dyn TransformEngine>, String)>,
    retained: Mutex<Option<Message>>,
}

impl RequestPort {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        connector: Arc<dyn Connector>,
        input: Arc<Slot>,
        output: Arc<Slot>,
    ) -> Self {
        Self {
            id: id.into(),
            connector,
            input,
            output,
            response_transform: None,
            retained: Mutex::new(None),
        }
    }

    /// Builder: applies `script` through `engine` to every response document
    /// before it is wrapped.
    #[must_use]
    pub fn with_response_transform(
        mut self,
        engine: Arc<dyn TransformEngine>,
        script: impl Into<String>,
    ) -> Self {
        self.response_transform = Some((engine, script.into()));
        self
    }

    /// Delivers a response document for the retained request.
    ///
    /// Fails with [`EngineError::MissingMessage`] when no request is parked.
    pub fn accept_response(&self, response: Document) -> Result<(), EngineError> {
        let retained =
            self.retained
                .lock()
                .take()
                .ok_or_else(|| EngineError::MissingMessage {
                    stage: self.id.clone(),
                    slot: "retained-request".to_string(),
                })?;
        let document = match &self.response_transform {
            Some((engine, script)) => {
                engine
                    .apply(&response, script)
                    .map_err(|err| EngineError::Transform {
                        stage: self.id.clone(),
                        message: err.to_string(),
                    })?
            }
            None => response,
        };
        self.output.enqueue(retained.transformed(document));
        Ok(())
    }
}

#[async_trait]
impl Stage for RequestPort {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), EngineError> {
        let request = take_message(&self.id, &self.input)?;
        let document = require_payload(&self.id, &request)?.clone();
        *self.retained.lock() = Some(request);

        let response = self
            .connector
            .call(Some(document))
            .await
            .map_err(|err| connector_error(&self.id, err))?;
        match response {
            Some(response) => self.accept_response(response),
            None => {
                debug!(stage = %self.id, "connector deferred its response");
                Ok(())
            }
        }
    }
}
