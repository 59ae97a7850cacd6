//! Tests for error types

use prometheus_scheduler::core::{NetError, NetProblem, SchedulerError, SyncError};

#[test]
fn test_sync_error_display() {
    assert_eq!(SyncError::Cancelled.to_string(), "operation cancelled");
    assert_eq!(SyncError::PoolEmpty.to_string(), "pool is empty");
    assert_eq!(SyncError::AlreadyStarted.to_string(), "pool already started");
}

#[test]
fn test_scheduler_error_display() {
    assert_eq!(SchedulerError::NotStarted.to_string(), "scheduler not started");
    assert_eq!(
        SchedulerError::AlreadyScheduled("job[1]".into()).to_string(),
        "job job[1] already scheduled"
    );
    assert_eq!(
        SchedulerError::Config("processors must be greater than 0".into()).to_string(),
        "config invalid: processors must be greater than 0"
    );
    assert_eq!(
        SchedulerError::from(SyncError::Cancelled).to_string(),
        "operation cancelled"
    );
}

#[test]
fn test_net_error_display() {
    let err = NetError::Invalid {
        net: "nightly".into(),
        problems: vec![
            NetProblem::UnknownCondition {
                job: "B".into(),
                reference: "gate".into(),
            },
            NetProblem::Cycle(vec!["A".into(), "B".into(), "A".into()]),
        ],
    };
    assert_eq!(
        err.to_string(),
        "invalid job net nightly: job B refers to unknown condition gate, cycle A->B->A"
    );
    let wrapped: SchedulerError = err.into();
    assert!(matches!(wrapped, SchedulerError::Net(_)));
}
