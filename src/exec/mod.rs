//! Process-wide concurrent scheduler.
//!
//! The [`ExecutionEnvironment`] drains a single priority queue with a
//! bounded-minimum, growable worker pool. Each submission wraps either a plain
//! future or a [`Stage`] exposing a workload-size hint; a pluggable
//! [`OrderingPolicy`] decides what runs next. An atomic active-work counter —
//! incremented at submission, decremented at completion regardless of outcome
//! — feeds the two-phase quiescence barrier callers use to learn that a flow
//! graph has drained.
//!
//! Failures of submitted work are recorded on the failure bus and logged;
//! sibling work items keep running. Shutdown stops new submissions without
//! interrupting in-flight work.

pub mod policy;

pub use policy::{FifoPolicy, MostWorkFirstPolicy, OrderingPolicy, WorkMeta};

use std::cmp::Ordering as CmpOrdering;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::errors::EngineError;
use crate::flow::Stage;
use crate::reports::FailureReporter;

/// Errors surfaced by the scheduler itself (work-item failures go to the
/// failure bus instead).
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    /// The environment no longer accepts submissions.
    #[error("execution environment is shut down; submission refused")]
    #[diagnostic(
        code(ductwork::exec::shut_down),
        help("Create a new environment or submit before calling shutdown().")
    )]
    ShutDown,
}

type WorkFuture = Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send>>;

struct WorkItem {
    meta: WorkMeta,
    label: String,
    job: WorkFuture,
}

struct Shared {
    queue: Mutex<Vec<WorkItem>>,
    policy: Arc<dyn OrderingPolicy>,
    reporter: FailureReporter,
    /// Wakes workers when work is queued or shutdown begins.
    queued: Notify,
    /// Wakes quiescence waiters when the active count reaches zero.
    quiet: Notify,
    /// Wakes phase-2 quiescence waiters on any new submission.
    activity: Notify,
    active: AtomicUsize,
    idle: AtomicUsize,
    seq: AtomicU64,
    epoch: AtomicU64,
    accepting: AtomicBool,
}

impl Shared {
    fn pop(&self) -> Option<WorkItem> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return None;
        }
        let mut best = 0;
        for index in 1..queue.len() {
            if self.policy.compare(&queue[index].meta, &queue[best].meta)
                == CmpOrdering::Greater
            {
                best = index;
            }
        }
        Some(queue.remove(best))
    }

    async fn run(&self, item: WorkItem) {
        trace!(label = %item.label, seq = item.meta.seq, "running work item");
        if let Err(err) = item.job.await {
            self.reporter.report(item.label, err);
        }
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.quiet.notify_waiters();
        }
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        let wakeup = shared.queued.notified();
        if let Some(item) = shared.pop() {
            shared.run(item).await;
            continue;
        }
        if !shared.accepting.load(Ordering::SeqCst) {
            break;
        }
        shared.idle.fetch_add(1, Ordering::SeqCst);
        wakeup.await;
        shared.idle.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Transient workers drain the backlog and exit; they realize the "growable
/// maximum" half of the pool.
async fn transient_loop(shared: Arc<Shared>) {
    while let Some(item) = shared.pop() {
        shared.run(item).await;
    }
}

/// Builder for an [`ExecutionEnvironment`].
pub struct ExecutionEnvironmentBuilder {
    min_workers: usize,
    policy: Arc<dyn OrderingPolicy>,
    reporter: FailureReporter,
}

impl ExecutionEnvironmentBuilder {
    /// Minimum number of permanent workers (default 2).
    #[must_use]
    pub fn min_workers(mut self, min_workers: usize) -> Self {
        self.min_workers = min_workers.max(1);
        self
    }

    /// Ordering policy for the priority queue (default FIFO).
    #[must_use]
    pub fn policy(mut self, policy: impl OrderingPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Destination for work-item failures (default: log only).
    #[must_use]
    pub fn reporter(mut self, reporter: FailureReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Spawns the permanent workers. Must be called within a tokio runtime.
    #[must_use]
    pub fn build(self) -> ExecutionEnvironment {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Vec::new()),
            policy: self.policy,
            reporter: self.reporter,
            queued: Notify::new(),
            quiet: Notify::new(),
            activity: Notify::new(),
            active: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
        });
        let workers = (0..self.min_workers)
            .map(|_| tokio::spawn(worker_loop(Arc::clone(&shared))))
            .collect();
        ExecutionEnvironment { shared, workers }
    }
}

/// Concurrent scheduler: priority work queue, growable worker pool, and a
/// two-phase quiescence barrier.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use ductwork::exec::{ExecutionEnvironment, MostWorkFirstPolicy};
///
/// # async fn example() {
/// let env = ExecutionEnvironment::builder()
///     .min_workers(4)
///     .policy(MostWorkFirstPolicy)
///     .build();
///
/// env.submit("warmup", async { Ok(()) }).unwrap();
/// env.wait_for_quiescence(Duration::from_millis(50)).await;
/// # }
/// ```
pub struct ExecutionEnvironment {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ExecutionEnvironment {
    #[must_use]
    pub fn builder() -> ExecutionEnvironmentBuilder {
        ExecutionEnvironmentBuilder {
            min_workers: 2,
            policy: Arc::new(FifoPolicy),
            reporter: FailureReporter::discard(),
        }
    }

    /// Submits a plain unit of work with no workload hint.
    pub fn submit<F>(&self, label: impl Into<String>, job: F) -> Result<(), ExecError>
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        self.submit_inner(label.into(), None, Box::pin(job))
    }

    /// Submits a unit of work carrying a pending-workload hint.
    pub fn submit_hinted<F>(
        &self,
        label: impl Into<String>,
        hint: usize,
        job: F,
    ) -> Result<(), ExecError>
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        self.submit_inner(label.into(), Some(hint), Box::pin(job))
    }

    /// Submits one execution of a stage, reading its workload hint at
    /// submission time.
    pub fn submit_stage(&self, stage: Arc<dyn Stage>) -> Result<(), ExecError> {
        let label = stage.id().to_string();
        let hint = stage.workload_hint();
        self.submit_inner(
            label,
            hint,
            Box::pin(async move { stage.execute().await }),
        )
    }

    fn submit_inner(
        &self,
        label: String,
        hint: Option<usize>,
        job: WorkFuture,
    ) -> Result<(), ExecError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(ExecError::ShutDown);
        }
        let seq = self.shared.seq.fetch_add(1, Ordering::SeqCst);
        self.shared.active.fetch_add(1, Ordering::SeqCst);
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.activity.notify_waiters();

        let grow = self.shared.idle.load(Ordering::SeqCst) == 0;
        self.shared.queue.lock().push(WorkItem {
            meta: WorkMeta { seq, hint },
            label,
            job,
        });
        self.shared.queued.notify_one();
        if grow {
            // All permanent workers are busy; a transient worker picks up the
            // backlog and exits when the queue empties.
            tokio::spawn(transient_loop(Arc::clone(&self.shared)));
        }
        Ok(())
    }

    /// Number of submitted work items not yet completed.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Whether new submissions are accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::SeqCst)
    }

    /// Stops accepting new submissions. In-flight work keeps running.
    pub fn shutdown(&self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        self.shared.queued.notify_waiters();
        debug!("execution environment shut down");
    }

    /// Blocks the caller until the environment is quiescent.
    ///
    /// Phase 1 waits unconditionally for the active count to reach zero.
    /// Phase 2 then waits up to `window`: if activity resumes inside the
    /// window the barrier restarts at phase 1, and only a full window with
    /// the count at zero declares quiescence. A zero window returns as soon
    /// as the count first reaches zero — even when nothing was ever
    /// submitted.
    pub async fn wait_for_quiescence(&self, window: Duration) {
        loop {
            loop {
                let quiet = self.shared.quiet.notified();
                tokio::pin!(quiet);
                // Register the waiter before reading the counter:
                // notify_waiters only wakes already-registered waiters.
                quiet.as_mut().enable();
                if self.shared.active.load(Ordering::SeqCst) == 0 {
                    break;
                }
                quiet.await;
            }
            if window.is_zero() {
                return;
            }

            let epoch = self.shared.epoch.load(Ordering::SeqCst);
            let resumed = self.shared.activity.notified();
            tokio::select! {
                () = tokio::time::sleep(window) => {
                    if self.shared.active.load(Ordering::SeqCst) == 0
                        && self.shared.epoch.load(Ordering::SeqCst) == epoch
                    {
                        return;
                    }
                }
                () = resumed => {
                    trace!("activity resumed during inactivity window");
                }
            }
        }
    }
}

impl Drop for ExecutionEnvironment {
    fn drop(&mut self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        for worker in &self.workers {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn quiescence_with_zero_window_returns_immediately() {
        let env = ExecutionEnvironment::builder().build();
        // Nothing was ever submitted; the count is already zero.
        env.wait_for_quiescence(Duration::ZERO).await;
    }

    #[tokio::test]
    async fn submitted_work_runs_and_drains() {
        let env = ExecutionEnvironment::builder().min_workers(2).build();
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..20 {
            let counter = Arc::clone(&counter);
            env.submit(format!("job-{i}"), async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        env.wait_for_quiescence(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(env.active_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn zero_window_wait_never_misses_a_concurrent_completion() {
        let env = ExecutionEnvironment::builder().min_workers(2).build();
        // Each round races the barrier against a job completing on another
        // worker; a lost count-reached-zero wakeup would hang the wait.
        for round in 0..500 {
            env.submit(format!("tick-{round}"), async { Ok(()) }).unwrap();
            tokio::time::timeout(
                Duration::from_millis(250),
                env.wait_for_quiescence(Duration::ZERO),
            )
            .await
            .expect("barrier missed the count reaching zero");
        }
        assert_eq!(env.active_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_recorded_not_propagated() {
        let bus = crate::reports::FailureBus::new();
        let env = ExecutionEnvironment::builder()
            .reporter(bus.reporter())
            .build();
        env.submit("bad", async {
            Err(EngineError::UnsupportedVariant {
                variant: "test".to_string(),
            })
        })
        .unwrap();
        env.submit("good", async { Ok(()) }).unwrap();
        env.wait_for_quiescence(Duration::from_millis(20)).await;

        let reports = bus.drain();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].stage_id, "bad");
    }

    #[tokio::test]
    async fn shutdown_refuses_new_submissions() {
        let env = ExecutionEnvironment::builder().build();
        env.shutdown();
        assert!(!env.is_accepting());
        let err = env.submit("late", async { Ok(()) }).unwrap_err();
        assert!(matches!(err, ExecError::ShutDown));
    }

    #[tokio::test]
    async fn quiescence_outlasts_a_gap_between_work_items() {
        let env = Arc::new(ExecutionEnvironment::builder().build());
        let follow_up_ran = Arc::new(AtomicUsize::new(0));

        let env2 = Arc::clone(&env);
        let flag = Arc::clone(&follow_up_ran);
        env.submit("first", async move {
            // Resubmit after a pause shorter than the inactivity window: the
            // barrier must not declare quiescence in between.
            tokio::time::sleep(Duration::from_millis(10)).await;
            env2.submit("second", async move {
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .ok();
            Ok(())
        })
        .unwrap();

        env.wait_for_quiescence(Duration::from_millis(100)).await;
        assert_eq!(follow_up_ran.load(Ordering::SeqCst), 1);
    }
}
