//! # Ductwork: Embeddable Message-Integration Engine
//!
//! Ductwork implements Enterprise-Integration-Pattern routing and
//! transformation over tree-structured documents. Operators wire small,
//! single-purpose processing units — filters, routers, splitters,
//! aggregators, correlators, enrichers — into a directed flow, then drive the
//! flow concurrently until no more work remains.
//!
//! ## Core Concepts
//!
//! - **Documents**: Ordered trees moved through the engine
//! - **Messages**: Envelopes with stable identity, headers, and sequence metadata
//! - **Slots**: Thread-safe FIFO queues, the only data path between stages
//! - **Tasks**: The routing/transformation taxonomy (Router, Modifier, Transformer)
//! - **Ports**: Boundary adapters over external connectors
//! - **ExecutionEnvironment**: Priority-scheduled worker pool with quiescence detection
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use ductwork::collaborators::{PathValue, QueryError};
//! use ductwork::document::Document;
//! use ductwork::message::Message;
//! use ductwork::slot::Slot;
//! use ductwork::flow::Stage;
//! use ductwork::tasks::Filter;
//!
//! # async fn example() -> Result<(), ductwork::errors::EngineError> {
//! // A predicate evaluator; production wiring injects a real path-query engine.
//! let evaluator = Arc::new(|doc: &Document, _expr: &str| -> Result<PathValue, QueryError> {
//!     Ok(PathValue::Bool(doc.name == "order"))
//! });
//!
//! let input = Slot::new("in");
//! let output = Slot::new("out");
//! input.enqueue(Message::new(Document::element("order")));
//!
//! let filter = Filter::new("orders-only", "self::order", evaluator, input, Arc::clone(&output));
//! filter.execute().await?;
//! assert_eq!(output.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving a Flow to Quiescence
//!
//! A [`flow::Flow`] is one ordered pass over its stages. Work a pass spawns
//! (Threader branches, dispatched stages) lands on the
//! [`exec::ExecutionEnvironment`]; callers block on
//! [`wait_for_quiescence`](exec::ExecutionEnvironment::wait_for_quiescence)
//! to learn when the graph has drained.
//!
//! ## Module Guide
//!
//! - [`document`] - Ordered tree payloads and index-path editing
//! - [`message`] - Message envelopes and header constants
//! - [`slot`] - Thread-safe FIFO queues
//! - [`collaborators`] - Boundary traits (connector, path evaluator, transform engine)
//! - [`services`] - Injected shared services (correlation ids, document store)
//! - [`tasks`] - The task taxonomy
//! - [`ports`] - Input/Output/Request boundary adapters
//! - [`flow`] - Ordered stage registry and pass driver
//! - [`exec`] - Concurrent scheduler and quiescence barrier
//! - [`reports`] - Out-of-band failure reporting
//! - [`telemetry`] - Tracing setup

pub mod collaborators;
pub mod document;
pub mod errors;
pub mod exec;
pub mod flow;
pub mod message;
pub mod ports;
pub mod reports;
pub mod services;
pub mod slot;
pub mod tasks;
pub mod telemetry;
