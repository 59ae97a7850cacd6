//! Tests for builder modules

use std::io::Write;
use std::sync::Arc;

use prometheus_scheduler::builders::SchedulerBuilder;
use prometheus_scheduler::config::SchedulerConfig;
use prometheus_scheduler::scheduler::extension::BufferedExtension;
use prometheus_scheduler::core::SchedulerError;
use prometheus_scheduler::scheduler::{define_job, OutputBuffer, State};
use prometheus_scheduler::util::Priority;
use prometheus_scheduler::Context;

#[test]
fn test_builder_from_config() {
    let config = SchedulerConfig {
        name: Some("configured".into()),
        processors: 2,
        default_priority: Priority(9),
    };

    let builder = SchedulerBuilder::from_config(config.clone());
    assert_eq!(builder.config(), &config);

    let scheduler = builder.build().unwrap();
    assert_eq!(scheduler.name(), "configured");
    assert_eq!(scheduler.default_priority(), Priority(9));
    assert_eq!(scheduler.stats().workers, 2);
}

#[test]
fn test_builder_overrides_config() {
    let builder = SchedulerBuilder::new()
        .name("override")
        .processors(1)
        .default_priority(Priority(-3));
    assert_eq!(builder.config().processors, 1);
    assert_eq!(builder.config().default_priority, Priority(-3));
}

#[test]
fn test_builder_rejects_empty_name() {
    let err = SchedulerBuilder::new().name("").processors(1).build().unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}

#[test]
fn test_builder_installs_extension() {
    let buffer = OutputBuffer::new();
    let scheduler = SchedulerBuilder::new()
        .name("buffered")
        .processors(1)
        .extension(Arc::new(BufferedExtension::new(buffer.writer())))
        .build()
        .unwrap();
    scheduler.run(&Context::background()).unwrap();

    let definition = define_job("hello", |ctx| {
        let id = ctx.job().id().to_owned();
        writeln!(ctx, "hello from {id}")?;
        Ok(serde_json::Value::Null)
    });
    let job = scheduler.schedule_definition(&definition, None).unwrap();
    job.wait();

    assert_eq!(job.state(), State::Done);
    assert_eq!(buffer.contents(), "- JOB hello[1] DONE\n  hello from hello[1]\n");

    scheduler.cancel();
    scheduler.wait();
}
