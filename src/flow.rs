//! Flow definition and the single-pass driver.
//!
//! A [`Flow`] is an ordered registry of [`Stage`]s (ports and tasks) making up
//! one processing graph. It owns none of their slots; those are shared by
//! reference across the graph, wired at construction time. The flow's only
//! state is membership and execution order.
//!
//! [`Flow::run`] performs one ordered pass, aborting on the first synchronous
//! error. [`Flow::dispatch`] instead submits every stage to an
//! [`ExecutionEnvironment`](crate::exec::ExecutionEnvironment); callers then
//! use the environment's quiescence barrier to detect completion of whatever
//! asynchronous work the pass triggered.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::errors::EngineError;
use crate::exec::{ExecError, ExecutionEnvironment};

/// A unit of work wired into a flow: any port or task.
///
/// Executions are expected to be short and non-blocking; physical I/O lives
/// behind [`Connector`](crate::collaborators::Connector) implementations.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Identifier used in diagnostics and failure reports.
    fn id(&self) -> &str;

    /// Runs one execution against whatever is currently queued on the stage's
    /// input slots.
    async fn execute(&self) -> Result<(), EngineError>;

    /// Pending-workload hint for priority scheduling. Stages without a
    /// meaningful measure return `None` and are ordered after hinted work.
    fn workload_hint(&self) -> Option<usize> {
        None
    }
}

/// Ordered registry of stages forming one processing graph.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use ductwork::flow::{Flow, Stage};
/// # async fn example(input: Arc<dyn Stage>, filter: Arc<dyn Stage>) -> Result<(), ductwork::errors::EngineError> {
/// let flow = Flow::new("orders")
///     .add_stage(input)
///     .add_stage(filter);
/// flow.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Flow {
    id: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Flow {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a stage; stages execute in the order they were added.
    #[must_use]
    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The registered stages, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Runs one ordered pass over all stages, failing fast on the first error.
    #[instrument(skip(self), fields(flow = %self.id))]
    pub async fn run(&self) -> Result<(), EngineError> {
        for stage in &self.stages {
            tracing::debug!(stage = stage.id(), "executing stage");
            stage.execute().await?;
        }
        Ok(())
    }

    /// Submits every stage to the environment in declared order.
    ///
    /// Failures of the submitted executions are recorded on the environment's
    /// failure bus rather than propagated here; only a refused submission
    /// (environment shut down) is an error.
    pub fn dispatch(&self, env: &ExecutionEnvironment) -> Result<(), ExecError> {
        for stage in &self.stages {
            env.submit_stage(Arc::clone(stage))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        id: String,
        log: Arc<parking_lot::Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Stage for Recorder {
        fn id(&self) -> &str {
            &self.id
        }

        async fn execute(&self) -> Result<(), EngineError> {
            self.log.lock().push(self.id.clone());
            if self.fail {
                return Err(EngineError::UnsupportedVariant {
                    variant: self.id.clone(),
                });
            }
            Ok(())
        }
    }

    fn recorder(id: &str, log: &Arc<parking_lot::Mutex<Vec<String>>>, fail: bool) -> Arc<dyn Stage> {
        Arc::new(Recorder {
            id: id.to_string(),
            log: Arc::clone(log),
            fail,
        })
    }

    #[tokio::test]
    async fn run_executes_in_declared_order() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let flow = Flow::new("f")
            .add_stage(recorder("a", &log, false))
            .add_stage(recorder("b", &log, false))
            .add_stage(recorder("c", &log, false));
        flow.run().await.unwrap();
        assert_eq!(*log.lock(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn run_aborts_pass_on_first_error() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let flow = Flow::new("f")
            .add_stage(recorder("a", &log, false))
            .add_stage(recorder("boom", &log, true))
            .add_stage(recorder("c", &log, false));
        let err = flow.run().await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedVariant { .. }));
        assert_eq!(*log.lock(), ["a", "boom"]);
    }
}
