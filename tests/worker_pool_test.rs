//! Integration tests for WorkerPool
//!
//! These tests validate real-world functionality including:
//! - Workers consuming a priority queue
//! - Shrinking the pool through discard
//! - Lending worker slots through the resource-pool interface
//! - Jobs synchronizing on a pool-bound monitor without deadlocking a
//!   single-processor scheduler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use prometheus_scheduler::builders::SchedulerBuilder;
use prometheus_scheduler::core::{
    Prioritized, PriorityQueue, ResourcePool, SyncError, Worker, WorkerPool,
};
use prometheus_scheduler::scheduler::{define_job, JobEvent, State};
use prometheus_scheduler::util::Priority;
use prometheus_scheduler::{Context, Monitor};
use serde_json::Value;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Task {
    id: usize,
    priority: Priority,
}

impl Prioritized for Task {
    fn priority(&self) -> Priority {
        self.priority
    }
}

fn task(id: usize, priority: i64) -> Task {
    Task {
        id,
        priority: Priority(priority),
    }
}

/// Pool whose workers record every task they take from the queue.
fn recording_pool(seen: &Arc<Mutex<Vec<usize>>>) -> (WorkerPool, Arc<PriorityQueue<Task>>) {
    let queue = Arc::new(PriorityQueue::<Task>::new());
    let source = Arc::clone(&queue);
    let seen = Arc::clone(seen);
    let pool = WorkerPool::new("pool-test", queue.clone(), move |_id| {
        let source = Arc::clone(&source);
        let seen = Arc::clone(&seen);
        Arc::new(move |ctx: &Context| {
            while let Ok(Some(task)) = source.get(ctx) {
                seen.lock().push(task.id);
            }
        }) as Arc<dyn Worker>
    });
    (pool, queue)
}

fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Barrier releasing its parties once `threshold` of them arrived.
struct Barrier {
    monitor: Monitor<usize>,
    threshold: usize,
}

impl Barrier {
    fn new(threshold: usize) -> Self {
        Self {
            monitor: Monitor::new(0),
            threshold,
        }
    }

    fn arrive(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        *guard.value() += 1;
        if *guard.value() >= self.threshold {
            guard.signal_all();
            return Ok(());
        }
        while *guard.value() < self.threshold {
            match ctx.pool() {
                Some(pool) => guard.wait_lending(ctx, pool.as_ref())?,
                None => guard.wait(ctx)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// WORKER POOL
// ============================================================================

#[test]
fn test_single_worker_follows_priority() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (pool, queue) = recording_pool(&seen);
    for (id, priority) in [(1, 1), (2, 50), (3, 10), (4, 50), (5, -7)] {
        queue.add(task(id, priority));
    }
    pool.add();
    pool.run(&Context::background()).unwrap();

    wait_until("queue drained", || seen.lock().len() == 5);
    assert_eq!(*seen.lock(), vec![2, 4, 3, 1, 5]);

    pool.cancel();
    pool.wait();
    assert_eq!(pool.stats().exited, 1);
}

#[test]
fn test_workers_added_while_running_start_immediately() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (pool, queue) = recording_pool(&seen);
    pool.run(&Context::background()).unwrap();
    assert!(pool.is_running());
    assert_eq!(pool.stats().running, 0);

    pool.add();
    pool.add();
    for id in 0..20 {
        queue.add(task(id, 0));
    }
    wait_until("queue drained", || seen.lock().len() == 20);
    assert_eq!(pool.stats().running, 2);

    pool.cancel();
    pool.wait();
    assert_eq!(pool.stats().running, 0);
}

#[test]
fn test_discard_shrinks_pool_by_one() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (pool, _queue) = recording_pool(&seen);
    for _ in 0..3 {
        pool.add();
    }
    pool.run(&Context::background()).unwrap();

    pool.discard(&Context::background()).unwrap();
    wait_until("one worker retired", || pool.size() == 2);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.stats().exited, 1);

    pool.cancel();
    pool.wait();
}

#[test]
fn test_release_lends_a_worker_and_alloc_takes_it_back() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (pool, queue) = recording_pool(&seen);
    pool.add();
    pool.run(&Context::background()).unwrap();
    let ctx = pool.context().unwrap();

    pool.release(&ctx);
    assert_eq!(pool.size(), 2);
    for id in 0..4 {
        queue.add(task(id, 0));
    }
    wait_until("queue drained", || seen.lock().len() == 4);

    pool.alloc(&ctx).unwrap();
    wait_until("lent worker retired", || pool.size() == 1);

    pool.cancel();
    pool.wait();
}

// ============================================================================
// SCHEDULER LENDING
// ============================================================================

#[test]
fn test_barrier_jobs_do_not_deadlock_single_processor() {
    let scheduler = SchedulerBuilder::new()
        .name("barrier")
        .processors(1)
        .build()
        .unwrap();
    scheduler.run(&Context::background()).unwrap();

    let barrier = Arc::new(Barrier::new(3));
    let passed = Arc::new(AtomicUsize::new(0));
    let events = Arc::new(Mutex::new(Vec::new()));

    let definition = {
        let barrier = Arc::clone(&barrier);
        let passed = Arc::clone(&passed);
        define_job("party", move |ctx| {
            barrier.arrive(ctx.context())?;
            passed.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
    };
    let first = {
        let events = Arc::clone(&events);
        definition.add_handler(move |event: &JobEvent| events.lock().push(event.state()))
    };

    let jobs = vec![
        scheduler.schedule_definition(&first, None).unwrap(),
        scheduler.schedule_definition(&definition, None).unwrap(),
        scheduler.schedule_definition(&definition, None).unwrap(),
    ];
    for job in &jobs {
        job.wait();
        assert_eq!(job.state(), State::Done);
    }
    assert_eq!(passed.load(Ordering::SeqCst), 3);

    // The first party blocked and lent its slot before the others ran.
    let states = events.lock().clone();
    assert!(states.contains(&State::Blocked));
    assert_eq!(
        &states[states.len() - 3..],
        &[State::Ready, State::Running, State::Done]
    );

    wait_until("lent processors retired", || scheduler.stats().workers == 1);
    scheduler.cancel();
    scheduler.wait();
}

#[test]
fn test_remove_processor_retires_idle_processor() {
    let scheduler = SchedulerBuilder::new()
        .name("shrink")
        .processors(2)
        .build()
        .unwrap();
    scheduler.run(&Context::background()).unwrap();
    assert_eq!(scheduler.stats().workers, 2);

    scheduler.remove_processor(&Context::background()).unwrap();
    wait_until("processor retired", || scheduler.stats().workers == 1);

    let job = scheduler
        .schedule_definition(&define_job("still-served", |_| Ok(Value::Null)), None)
        .unwrap();
    job.wait();
    assert_eq!(job.state(), State::Done);

    scheduler.cancel();
    scheduler.wait();
}

#[test]
fn test_remove_processor_cancelled() {
    let scheduler = SchedulerBuilder::new()
        .name("no-processors")
        .processors(1)
        .build()
        .unwrap();
    // Not running: nobody takes the request.
    let ctx = Context::background();
    ctx.cancel();
    assert_eq!(scheduler.remove_processor(&ctx), Err(SyncError::Cancelled));
}
