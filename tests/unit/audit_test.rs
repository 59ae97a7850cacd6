//! Tests for audit sink and handler

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_scheduler::builders::SchedulerBuilder;
use prometheus_scheduler::scheduler::{
    define_job, AuditEvent, AuditHandler, AuditSink, InMemoryAuditSink, State,
};
use prometheus_scheduler::Context;

fn event(job: &str, state: State) -> AuditEvent {
    AuditEvent {
        job_id: format!("{job}[1]"),
        job_name: job.to_owned(),
        parent_id: None,
        state,
        created_at_ms: 1,
    }
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::with_capacity(2);

    sink.append(event("a", State::Pending));
    sink.append(event("b", State::Running));
    sink.append(event("c", State::Done));

    let events = sink.entries();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].job_name, "b"); // First one popped
    assert_eq!(events[1].job_name, "c");
    assert_eq!(sink.evicted(), 1);
}

#[test]
fn test_audit_event_serializes_state() {
    let json = serde_json::to_value(event("a", State::Discarded)).unwrap();
    assert_eq!(json["state"], "DISCARDED");
    assert_eq!(json["job_id"], "a[1]");
}

#[test]
fn test_audit_handler_records_lifecycle() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::with_capacity(16)));
    let scheduler = SchedulerBuilder::new().name("audit").processors(1).build().unwrap();
    scheduler.run(&Context::background()).unwrap();

    let definition = define_job("audited", |_| Ok(serde_json::Value::Null))
        .add_handler(AuditHandler::new(Arc::clone(&sink)));
    let job = scheduler.schedule_definition(&definition, None).unwrap();
    job.wait();

    let events = sink.lock().entries();
    let states: Vec<State> = events.iter().map(|e| e.state).collect();
    assert_eq!(states, vec![State::Pending, State::Running, State::Done]);
    assert!(events.iter().all(|e| e.job_id == "audited[1]" && e.parent_id.is_none()));
    assert!(events.iter().all(|e| e.created_at_ms > 0));

    scheduler.cancel();
    scheduler.wait();
}
