//! Audit trail of job state changes.
//!
//! [`AuditHandler`] is an [`EventHandler`] turning job events into
//! [`AuditEvent`]s recorded by an [`AuditSink`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::scheduler::definition::EventHandler;
use crate::scheduler::state::{JobEvent, State};
use crate::util::clock::now_ms;

/// Audit record of one state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Job id.
    pub job_id: String,
    /// Definition name.
    pub job_name: String,
    /// Id of the parent job, for nested jobs.
    pub parent_id: Option<String>,
    /// State entered.
    pub state: State,
    /// Milliseconds since the Unix epoch when the change was observed.
    pub created_at_ms: u128,
}

impl AuditEvent {
    /// Build the record for `event`, stamped now.
    #[must_use]
    pub fn from_event(event: &JobEvent) -> Self {
        let job = event.job();
        Self {
            job_id: job.id().to_owned(),
            job_name: job.name().to_owned(),
            parent_id: job.parent().map(|p| p.id().to_owned()),
            state: event.state(),
            created_at_ms: now_ms(),
        }
    }
}

/// Destination of job audit records.
pub trait AuditSink: Send {
    /// Append the record of one state change.
    fn append(&mut self, event: AuditEvent);
}

/// Ring of the most recent job audit records.
///
/// Once `capacity` records are held, every append evicts the oldest one.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    ring: VecDeque<AuditEvent>,
    capacity: usize,
    evicted: u64,
}

impl InMemoryAuditSink {
    /// Sink holding at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Held records, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEvent> {
        self.ring.iter().cloned().collect()
    }

    /// Held records of job `job_id`, oldest first.
    #[must_use]
    pub fn for_job(&self, job_id: &str) -> Vec<AuditEvent> {
        self.ring.iter().filter(|e| e.job_id == job_id).cloned().collect()
    }

    /// Number of records dropped to stay within capacity.
    #[must_use]
    pub const fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&mut self, event: AuditEvent) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        while self.ring.len() >= self.capacity {
            self.ring.pop_front();
            self.evicted += 1;
        }
        self.ring.push_back(event);
    }
}

/// Event handler recording every event into a shared sink.
pub struct AuditHandler<S> {
    sink: Arc<Mutex<S>>,
}

impl<S: AuditSink> AuditHandler<S> {
    /// Record into `sink`.
    pub fn new(sink: Arc<Mutex<S>>) -> Self {
        Self { sink }
    }

    /// The sink events are recorded into.
    pub fn sink(&self) -> &Arc<Mutex<S>> {
        &self.sink
    }
}

impl<S: AuditSink> EventHandler for AuditHandler<S> {
    fn handle_job_event(&self, event: &JobEvent) {
        self.sink.lock().append(AuditEvent::from_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(job: &str, state: State) -> AuditEvent {
        AuditEvent {
            job_id: job.to_owned(),
            job_name: "j".to_owned(),
            parent_id: None,
            state,
            created_at_ms: now_ms(),
        }
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut sink = InMemoryAuditSink::with_capacity(2);
        sink.append(record("j[1]", State::Pending));
        sink.append(record("j[2]", State::Running));
        sink.append(record("j[1]", State::Done));
        let states: Vec<_> = sink.entries().into_iter().map(|e| e.state).collect();
        assert_eq!(states, vec![State::Running, State::Done]);
        assert_eq!(sink.evicted(), 1);
        assert_eq!(sink.for_job("j[1]").len(), 1);
    }

    #[test]
    fn test_zero_capacity_drops_everything() {
        let mut sink = InMemoryAuditSink::with_capacity(0);
        sink.append(record("j[1]", State::Pending));
        assert!(sink.entries().is_empty());
        assert_eq!(sink.evicted(), 1);
    }
}
