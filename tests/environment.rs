//! Scheduler integration: dispatching flows, quiescence, and the failure bus.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ductwork::collaborators::{PathValue, QueryError};
use ductwork::document::Document;
use ductwork::errors::EngineError;
use ductwork::exec::{ExecError, ExecutionEnvironment, MostWorkFirstPolicy};
use ductwork::flow::{Flow, Stage};
use ductwork::message::Message;
use ductwork::reports::FailureBus;
use ductwork::services::CorrelationIdSource;
use ductwork::slot::Slot;
use ductwork::tasks::{CorrelationIdSetter, Filter, Threader};

fn pass_everything() -> Arc<dyn ductwork::collaborators::PathEvaluator> {
    Arc::new(|_: &Document, _: &str| -> Result<PathValue, QueryError> {
        Ok(PathValue::Bool(true))
    })
}

#[tokio::test]
async fn dispatched_flow_drains_every_stage() {
    let env = ExecutionEnvironment::builder().min_workers(2).build();

    // Independent filter lanes; dispatch order between them does not matter.
    let mut flow = Flow::new("fan");
    let mut outputs = Vec::new();
    for lane in 0..3 {
        let input = Slot::new(format!("in-{lane}"));
        let output = Slot::new(format!("out-{lane}"));
        for _ in 0..2 {
            input.enqueue(Message::new(Document::element("doc")));
        }
        flow = flow.add_stage(Arc::new(Filter::new(
            format!("filter-{lane}"),
            "*",
            pass_everything(),
            input,
            Arc::clone(&output),
        )));
        outputs.push(output);
    }

    flow.dispatch(&env).unwrap();
    env.wait_for_quiescence(Duration::from_millis(25)).await;

    for output in outputs {
        assert_eq!(output.len(), 2);
    }
}

struct AlwaysFails;

#[async_trait]
impl Stage for AlwaysFails {
    fn id(&self) -> &str {
        "boom"
    }

    async fn execute(&self) -> Result<(), EngineError> {
        Err(EngineError::UnsupportedVariant {
            variant: "always".to_string(),
        })
    }
}

#[tokio::test]
async fn threader_branch_failure_reaches_the_bus_not_the_caller() {
    let bus = FailureBus::new();
    let input = Slot::new("in");
    let handoff = Slot::new("handoff");
    input.enqueue(Message::new(Document::element("job")));

    let threader = Threader::new(
        "relay",
        input,
        Arc::clone(&handoff),
        Arc::new(AlwaysFails),
        bus.reporter(),
    );
    threader.execute().await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(1), bus.recv_async())
        .await
        .expect("branch failure never reported")
        .unwrap();
    assert_eq!(report.stage_id, "relay/boom");
    // The handoff copy stays queued; the failing branch never consumed it.
    assert_eq!(handoff.len(), 1);
}

#[tokio::test]
async fn correlation_ids_stay_unique_under_concurrent_stamping() {
    let env = ExecutionEnvironment::builder().min_workers(4).build();
    let input = Slot::new("in");
    let output = Slot::new("out");
    for _ in 0..40 {
        input.enqueue(Message::new(Document::element("doc")));
    }

    let setter: Arc<dyn Stage> = Arc::new(CorrelationIdSetter::new(
        "stamp",
        CorrelationIdSource::new(),
        Arc::clone(&input),
        Arc::clone(&output),
    ));
    for _ in 0..40 {
        env.submit_stage(Arc::clone(&setter)).unwrap();
    }
    env.wait_for_quiescence(Duration::from_millis(25)).await;

    assert_eq!(output.len(), 40);
    let mut seen = HashSet::new();
    while let Some(message) = output.dequeue() {
        let id = message.header(Message::CORRELATION_ID).unwrap().to_string();
        assert_eq!(id.len(), 10);
        assert!(seen.insert(id), "correlation id issued twice");
    }
}

#[tokio::test]
async fn single_permanent_worker_still_drains_a_burst() {
    let env = ExecutionEnvironment::builder()
        .min_workers(1)
        .policy(MostWorkFirstPolicy)
        .build();
    let completed = Arc::new(AtomicUsize::new(0));

    for hint in 0..10 {
        let completed = Arc::clone(&completed);
        env.submit_hinted(format!("burst-{hint}"), hint, async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }
    env.wait_for_quiescence(Duration::from_millis(30)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 10);

    env.shutdown();
    assert!(matches!(
        env.submit("late", async { Ok(()) }).unwrap_err(),
        ExecError::ShutDown
    ));
}
