//! Tests for utility functions

use prometheus_scheduler::util::{init_tracing_with, now_ms, IdAllocator, Priority, DEFAULT_PRIORITY};

#[test]
fn test_priority_ordering() {
    assert!(Priority(10).precedes(Priority(1)));
    assert!(!Priority(1).precedes(Priority(10)));
    assert!(!Priority(5).precedes(Priority(5)));
    assert!(Priority(-1) < Priority(0));
}

#[test]
fn test_priority_conversions() {
    assert_eq!(Priority::from(42), Priority(42));
    assert_eq!(Priority::default(), DEFAULT_PRIORITY);
    assert_eq!(Priority(7).to_string(), "7");
    assert_eq!(serde_json::to_string(&Priority(3)).unwrap(), "3");
}

#[test]
fn test_id_allocator_reuses_lowest_free_id() {
    let mut ids = IdAllocator::new();
    assert!(ids.is_empty());
    assert_eq!(ids.allocate(), 1);
    assert_eq!(ids.allocate(), 2);
    assert_eq!(ids.allocate(), 3);
    assert!(ids.release(2));
    assert!(!ids.release(2));
    assert_eq!(ids.len(), 2);
    assert_eq!(ids.allocate(), 2);
    assert_eq!(ids.allocate(), 4);
}

#[test]
fn test_now_ms_advances() {
    let before = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(now_ms() > before);
}

#[test]
fn test_init_tracing_only_once() {
    init_tracing_with("prometheus_scheduler=debug");
    assert!(!init_tracing_with("prometheus_scheduler=debug"));
}
