//! Tests for tokio bridge utilities

use std::time::Duration;

use prometheus_scheduler::builders::SchedulerBuilder;
use prometheus_scheduler::runtime::{wait_job, wait_job_context, wait_scheduler};
use prometheus_scheduler::scheduler::condition::Explicit;
use prometheus_scheduler::scheduler::{define_job, JobDefinition, Scheduler, State};
use prometheus_scheduler::core::SyncError;
use prometheus_scheduler::Context;

fn running_scheduler(name: &str) -> Scheduler {
    let scheduler = SchedulerBuilder::new().name(name).processors(1).build().unwrap();
    scheduler.run(&Context::background()).unwrap();
    scheduler
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_job() {
    let scheduler = running_scheduler("tokio-wait");
    let definition = define_job("answer", |_| Ok(serde_json::json!(42)));
    let job = scheduler.schedule_definition(&definition, None).unwrap();

    let state = wait_job(job.clone()).await.expect("join");
    assert_eq!(state, State::Done);
    assert_eq!(job.result().unwrap(), Some(serde_json::json!(42)));

    scheduler.cancel();
    wait_scheduler(scheduler).await.expect("join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_job_context_cancelled() {
    let scheduler = running_scheduler("tokio-cancel");
    let gate = Explicit::new();
    let definition = JobDefinition::new("gated").with_condition(gate.clone());
    let job = scheduler.schedule_definition(&definition, None).unwrap();
    assert_eq!(job.state(), State::Waiting);

    let ctx = Context::background().child();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });
    let result = wait_job_context(job.clone(), ctx).await;
    assert_eq!(result, Err(SyncError::Cancelled));

    gate.enable(true);
    assert_eq!(wait_job(job).await.expect("join"), State::Done);

    scheduler.cancel();
    wait_scheduler(scheduler).await.expect("join");
}
