//! Out-of-band failure reporting.
//!
//! Asynchronous work — Threader branches and items submitted to the
//! [`ExecutionEnvironment`](crate::exec::ExecutionEnvironment) — must never
//! propagate failures into the caller's flow of control. Failures are instead
//! pushed onto a [`FailureBus`] where operators (or tests) can observe them.
//! A reporter without a bus degrades to a `tracing` warning, so the discard
//! sink is always safe.

use chrono::{DateTime, Utc};

/// One recorded failure from asynchronous work.
#[derive(Clone, Debug)]
pub struct FailureReport {
    /// Identifier of the stage or work item that failed.
    pub stage_id: String,
    /// When the failure was recorded.
    pub when: DateTime<Utc>,
    /// Rendered error.
    pub error: String,
}

/// Fan-in channel collecting [`FailureReport`]s from concurrent producers.
///
/// # Examples
///
/// ```
/// use ductwork::reports::FailureBus;
///
/// let bus = FailureBus::new();
/// let reporter = bus.reporter();
/// reporter.report("threader-1", "sub-task exploded");
///
/// let reports = bus.drain();
/// assert_eq!(reports.len(), 1);
/// assert_eq!(reports[0].stage_id, "threader-1");
/// ```
pub struct FailureBus {
    channel: (flume::Sender<FailureReport>, flume::Receiver<FailureReport>),
}

impl Default for FailureBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel: flume::unbounded(),
        }
    }

    /// Returns a cloneable reporter handle for producers.
    #[must_use]
    pub fn reporter(&self) -> FailureReporter {
        FailureReporter {
            sender: Some(self.channel.0.clone()),
        }
    }

    /// Removes and returns every report currently queued.
    #[must_use]
    pub fn drain(&self) -> Vec<FailureReport> {
        self.channel.1.try_iter().collect()
    }

    /// Awaits the next report. Returns `None` when all reporters are dropped.
    pub async fn recv_async(&self) -> Option<FailureReport> {
        self.channel.1.recv_async().await.ok()
    }
}

/// Producer handle for a [`FailureBus`].
///
/// `FailureReporter::discard()` yields a reporter that only logs, used where
/// the operator has not attached a bus.
#[derive(Clone, Debug, Default)]
pub struct FailureReporter {
    sender: Option<flume::Sender<FailureReport>>,
}

impl FailureReporter {
    /// Reporter that logs failures without recording them anywhere.
    #[must_use]
    pub fn discard() -> Self {
        Self { sender: None }
    }

    /// Records a failure. Never fails; a disconnected bus is tolerated.
    pub fn report(&self, stage_id: impl Into<String>, error: impl std::fmt::Display) {
        let stage_id = stage_id.into();
        let error = error.to_string();
        tracing::warn!(stage = %stage_id, error = %error, "async work item failed");
        if let Some(sender) = &self.sender {
            let _ = sender.send(FailureReport {
                stage_id,
                when: Utc::now(),
                error,
            });
        }
    }
}
