//! Error surface shared by tasks, ports, and flows.
//!
//! Synchronous `execute` failures abort the current pass of the enclosing
//! [`Flow`](crate::flow::Flow); work submitted to the
//! [`ExecutionEnvironment`](crate::exec::ExecutionEnvironment) has its failures
//! recorded out-of-band without aborting sibling work items.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by task and port execution.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A slot was expected to hold a message but was empty.
    #[error("no message available on slot '{slot}' for {stage}")]
    #[diagnostic(
        code(ductwork::missing_message),
        help("Upstream stages did not produce input; check flow wiring and execution order.")
    )]
    MissingMessage { stage: String, slot: String },

    /// A message was present but carried no document payload.
    #[error("message '{message_id}' has no document (required by {stage})")]
    #[diagnostic(
        code(ductwork::missing_document),
        help("Payload-less messages are error sentinels; this stage requires a document.")
    )]
    MissingDocument { stage: String, message_id: String },

    /// A path expression was malformed or could not be evaluated.
    #[error("path expression '{expression}' failed in {stage}: {message}")]
    #[diagnostic(code(ductwork::path_evaluation))]
    PathEvaluation {
        stage: String,
        expression: String,
        message: String,
    },

    /// A fragment lacked the envelope fields needed for reassembly.
    #[error("missing structural metadata in {stage}: {detail}")]
    #[diagnostic(
        code(ductwork::missing_structural_metadata),
        help("Fragments must carry the metadata block written by a Chopper (or the context fields this stage reads).")
    )]
    MissingStructuralMetadata { stage: String, detail: String },

    /// Routing-rule count did not match destination-slot count.
    #[error("{stage}: {rules} routing rules but {destinations} destination slots")]
    #[diagnostic(
        code(ductwork::slot_arity_mismatch),
        help("Supply exactly one destination slot per routing rule.")
    )]
    SlotArityMismatch {
        stage: String,
        rules: usize,
        destinations: usize,
    },

    /// A fan-out task was constructed without any output slots.
    #[error("{stage} requires at least one output slot")]
    #[diagnostic(code(ductwork::no_output_slots))]
    NoOutputSlots { stage: String },

    /// A requested task or port variant is not implemented.
    #[error("unsupported variant: {variant}")]
    #[diagnostic(code(ductwork::unsupported_variant))]
    UnsupportedVariant { variant: String },

    /// The declarative-transformation engine rejected a script or document.
    #[error("transformation failed in {stage}: {message}")]
    #[diagnostic(code(ductwork::transform))]
    Transform { stage: String, message: String },

    /// An external connector failed.
    #[error("connector error in {stage}: {message}")]
    #[diagnostic(code(ductwork::connector))]
    Connector { stage: String, message: String },
}
