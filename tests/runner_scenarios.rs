//! Integration tests for the task-graph runner.
//!
//! These tests drive complete runs through the public API:
//! - retry rounds until the attempt budget is exhausted
//! - fan-out children and the submitted counter
//! - concurrent report writes through one sink
//! - permanent failures that skip the retry queue
//! - data-dependent branching, warnings and post-action failures
//! - event sequencing seen by subscribers

use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use taskgraph::{
    BackoffPolicy, Disposition, Domain, Event, EventKind, FanOut, JsonLinesWriter, Level,
    MemoryWriter, Param, PostActionError, ReportRow, ReportSink, RetryPolicy, Runner,
    RunnerConfig, Subscribe, Task, TaskError, TaskFn, Warning, WarningRow,
};

// =============================================================================
// Test Helpers
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Workspace,
    Store,
    Layer,
    Probe,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Workspace => "workspace",
            Kind::Store => "store",
            Kind::Layer => "layer",
            Kind::Probe => "probe",
        })
    }
}

struct Gis;

impl Domain for Gis {
    type Context = ();
    type Kind = Kind;
    type Output = Vec<String>;
}

const BACKOFF: Duration = Duration::from_millis(20);

fn config(workers: usize) -> RunnerConfig {
    RunnerConfig {
        workers,
        retry: RetryPolicy {
            attempts: 3,
            success_consumes_attempt: true,
        },
        backoff: BackoffPolicy::constant(BACKOFF),
        ..RunnerConfig::default()
    }
}

struct Sinks {
    sink: Arc<ReportSink>,
    reports: MemoryWriter<ReportRow>,
    warnings: MemoryWriter<WarningRow>,
}

fn sinks() -> Sinks {
    let reports = MemoryWriter::new();
    let warnings = MemoryWriter::new();
    Sinks {
        sink: ReportSink::new(reports.clone(), warnings.clone()),
        reports,
        warnings,
    }
}

/// Task that always returns `output`.
fn ok(
    kind: Kind,
    name: String,
    output: Vec<String>,
) -> TaskFn<Gis, impl FnMut(&()) -> Result<Vec<String>, TaskError> + Send + 'static> {
    TaskFn::new(kind, move |_: &()| Ok(output.clone())).with_param("name", name)
}

/// Layer lookup that records how often it was called.
struct FlakyLayer {
    name: String,
    calls: Arc<AtomicU32>,
    fail_first: u32,
}

impl Task<Gis> for FlakyLayer {
    fn kind(&self) -> Kind {
        Kind::Layer
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::new("layer", &self.name)]
    }

    fn exec(&mut self, _ctx: &()) -> Result<Vec<String>, TaskError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            Err(TaskError::connection(format!("connection refused (call {n})")))
        } else {
            Ok(vec![format!("{}:ok", self.name)])
        }
    }

    fn warnings(&self, output: &Vec<String>) -> Vec<Warning> {
        if output.is_empty() {
            vec![Warning::warning("layer has no features")]
        } else {
            Vec::new()
        }
    }
}

/// Subscriber collecting every event.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Subscribe for Recorder {
    fn on_event(&self, ev: &Event) {
        self.events.lock().push(ev.clone());
    }
}

impl Recorder {
    fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

/// Cloneable byte buffer writing one byte per call.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(&byte) = buf.first() else {
            return Ok(0);
        };
        self.0.lock().push(byte);
        Ok(1)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_transient_failure_exhausts_budget() {
    let s = sinks();
    let calls = Arc::new(AtomicU32::new(0));
    let mut runner = Runner::<Gis>::builder(config(2), ())
        .with_fan_out(FanOut::builder().on_every(s.sink.action()).build())
        .build();
    runner.add_task(FlakyLayer {
        name: "topp:states".into(),
        calls: Arc::clone(&calls),
        fail_first: u32::MAX,
    });

    let t0 = Instant::now();
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert!(t0.elapsed() >= BACKOFF * 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rounds, 2);

    let rows = s.reports.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "failed");
    assert_eq!(rows[0].retries, 2);
    assert_eq!(rows[0].attempts, 3);
    assert_eq!(rows[0].errors.len(), 1);
    assert!(rows[0].errors[0].contains("call 3"));

    let warnings = s.warnings.rows();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::Error);
}

#[test]
fn test_fan_out_children_are_submitted_and_reported_once() {
    let s = sinks();
    let fan_out = FanOut::<Gis>::builder()
        .children(Kind::Workspace, |stores: &Vec<String>| {
            stores
                .iter()
                .map(|name| ok(Kind::Store, name.clone(), Vec::new()).boxed())
                .collect()
        })
        .on_every(s.sink.action())
        .build();

    let mut runner = Runner::<Gis>::builder(config(3), ()).with_fan_out(fan_out).build();
    runner.add_task(ok(
        Kind::Workspace,
        "topp".into(),
        vec!["a".into(), "b".into(), "c".into()],
    ));
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(summary.submitted, 4);
    assert_eq!(summary.succeeded, 4);

    let rows = s.reports.rows();
    assert_eq!(rows.len(), 4);
    let ids: HashSet<u64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 4);
    let children: Vec<&ReportRow> = rows.iter().filter(|r| r.parent == Some(1)).collect();
    assert_eq!(children.len(), 3);
    assert!(children.iter().all(|r| r.kind == "store"));
}

#[test]
fn test_parallel_reports_are_well_formed() {
    let buf = SharedBuf::default();
    let sink = ReportSink::new(
        JsonLinesWriter::new(buf.clone()),
        MemoryWriter::<WarningRow>::new(),
    );
    let mut runner = Runner::<Gis>::builder(config(4), ())
        .with_fan_out(FanOut::builder().on_every(sink.action()).build())
        .build();
    for i in 0..100 {
        runner.add_task(ok(Kind::Probe, format!("probe-{i}"), vec![format!("{i}")]));
    }
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();
    assert_eq!(summary.succeeded, 100);

    let text = String::from_utf8(buf.0.lock().clone()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 100);
    let mut ids = HashSet::new();
    for line in lines {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["status"], "succeeded");
        ids.insert(v["id"].as_u64().unwrap());
    }
    assert_eq!(ids.len(), 100);
    assert_eq!(sink.report_rows(), 100);
}

#[test]
fn test_permanent_signature_fails_without_retry() {
    let s = sinks();
    let recorder = Arc::new(Recorder::default());
    let mut runner = Runner::<Gis>::builder(config(2), ())
        .with_fan_out(FanOut::builder().on_every(s.sink.action()).build())
        .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
        .build();
    runner.add_task(TaskFn::<Gis, _>::new(Kind::Layer, |_: &()| {
        Err(TaskError::fail("Could not find layer topp:missing"))
    }));
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retried, 0);
    assert_eq!(summary.rounds, 0);
    assert_eq!(recorder.count(EventKind::RetryScheduled), 0);
    assert_eq!(recorder.count(EventKind::TaskStarting), 1);

    let row = &s.reports.rows()[0];
    assert_eq!(row.status, "failed");
    assert_eq!(row.retries, 0);
    assert_eq!(row.attempts, 1);
}

// =============================================================================
// Behavior
// =============================================================================

#[test]
fn test_retry_then_success_keeps_history() {
    let s = sinks();
    let calls = Arc::new(AtomicU32::new(0));
    let mut runner = Runner::<Gis>::builder(config(2), ())
        .with_fan_out(FanOut::builder().on_every(s.sink.action()).build())
        .build();
    runner.add_task(FlakyLayer {
        name: "roads".into(),
        calls: Arc::clone(&calls),
        fail_first: 1,
    });
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.retried, 1);
    let row = &s.reports.rows()[0];
    assert_eq!(row.status, "succeeded");
    assert_eq!(row.attempts, 2);
    assert_eq!(row.retries, 1);
    assert_eq!(row.attempts_remaining, 1);
    assert!(row.errors.is_empty());
}

#[test]
fn test_data_dependent_branching() {
    let s = sinks();
    let fan_out = FanOut::<Gis>::builder()
        .children(Kind::Store, |layers: &Vec<String>| {
            layers
                .iter()
                .map(|l| ok(Kind::Layer, l.clone(), vec![l.clone()]).boxed())
                .collect()
        })
        .children(Kind::Layer, |out: &Vec<String>| {
            out.iter()
                .filter(|l| l.ends_with("_geom"))
                .map(|l| ok(Kind::Probe, l.clone(), vec!["200".into()]).boxed())
                .collect()
        })
        .on_every(s.sink.action())
        .build();

    let mut runner = Runner::<Gis>::builder(config(4), ()).with_fan_out(fan_out).build();
    runner.add_task(ok(
        Kind::Store,
        "shapes".into(),
        vec!["roads_geom".into(), "legend".into(), "rivers_geom".into()],
    ));
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(summary.submitted, 6);
    let probes = s
        .reports
        .rows()
        .into_iter()
        .filter(|r| r.kind == "probe")
        .count();
    assert_eq!(probes, 2);
}

#[test]
fn test_warnings_do_not_fail_task() {
    let s = sinks();
    let mut runner = Runner::<Gis>::builder(config(1), ())
        .with_fan_out(FanOut::builder().on_every(s.sink.action()).build())
        .build();
    runner.add_task(FlakyLayer {
        name: "empty".into(),
        calls: Arc::new(AtomicU32::new(0)),
        fail_first: 0,
    });
    runner.add_task(
        ok(Kind::Layer, "blank".into(), Vec::new()).with_warnings(|out| {
            if out.is_empty() {
                vec![Warning::warning("layer is disabled")]
            } else {
                Vec::new()
            }
        }),
    );
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert!(summary.is_clean());
    let warnings = s.warnings.rows();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::Warning);
    assert_eq!(warnings[0].message, "layer is disabled");
}

#[test]
fn test_post_action_failure_keeps_task_succeeded() {
    let s = sinks();
    let fan_out = FanOut::<Gis>::builder()
        .spawn(Kind::Workspace, |_| {
            Err(PostActionError::spawn("listing was truncated"))
        })
        .report(Kind::Workspace, |_| panic!("mailer offline"))
        .on_every(s.sink.action())
        .build();
    let mut runner = Runner::<Gis>::builder(config(2), ()).with_fan_out(fan_out).build();
    runner.add_task(ok(Kind::Workspace, "topp".into(), vec!["x".into()]));
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    let row = &s.reports.rows()[0];
    assert_eq!(row.status, "succeeded");
    assert_eq!(row.errors.len(), 2);
    assert_eq!(s.warnings.len(), 2);
}

#[test]
fn test_custom_classifier_and_task_budget() {
    let s = sinks();
    let calls = Arc::new(AtomicU32::new(0));
    let mut runner = Runner::<Gis>::builder(config(2), ())
        .with_fan_out(FanOut::builder().on_every(s.sink.action()).build())
        .with_classifier(|err: &TaskError| match err {
            TaskError::Fatal { .. } => Disposition::Retry,
            _ => Disposition::Permanent,
        })
        .build();

    let counted = Arc::clone(&calls);
    runner.add_task(
        TaskFn::<Gis, _>::new(Kind::Probe, move |_: &()| {
            counted.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::fatal("503 while reindexing"))
        })
        .with_attempts(5),
    );
    runner.add_task(TaskFn::<Gis, _>::new(Kind::Probe, |_: &()| {
        Err(TaskError::connection("refused"))
    }));
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.retried, 4);
}

#[test]
fn test_add_task_with_overrides_fan_out() {
    let s = sinks();
    let other = sinks();
    let mut runner = Runner::<Gis>::builder(config(2), ())
        .with_fan_out(FanOut::builder().on_every(s.sink.action()).build())
        .build();
    runner.add_task(ok(Kind::Probe, "default".into(), Vec::new()));
    runner.add_task_with(
        ok(Kind::Probe, "explicit".into(), Vec::new()),
        FanOut::builder().on_every(other.sink.action()).build(),
    );
    runner.start().unwrap();
    runner.wait_to_shutdown().unwrap();

    assert_eq!(s.reports.rows()[0].params, "name=default");
    assert_eq!(other.reports.rows()[0].params, "name=explicit");
}

#[test]
fn test_events_are_sequenced_per_runner() {
    let recorder = Arc::new(Recorder::default());
    let mut runner = Runner::<Gis>::builder(config(3), ())
        .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
        .build();
    for i in 0..10 {
        runner.add_task(ok(Kind::Probe, i.to_string(), Vec::new()));
    }
    runner.start().unwrap();
    runner.wait_to_shutdown().unwrap();

    let events = recorder.events.lock();
    let mut seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    seqs.sort_unstable();
    let expected: Vec<u64> = (1..=events.len() as u64).collect();
    assert_eq!(seqs, expected);
    drop(events);

    assert_eq!(recorder.count(EventKind::TaskSubmitted), 10);
    assert_eq!(recorder.count(EventKind::TaskSucceeded), 10);
    assert_eq!(recorder.count(EventKind::ShutdownRequested), 1);
    assert_eq!(recorder.count(EventKind::AllStopped), 1);

    let second = Arc::new(Recorder::default());
    let runner = Runner::<Gis>::builder(config(1), ())
        .with_subscribers(vec![second.clone() as Arc<dyn Subscribe>])
        .build();
    runner.add_task(ok(Kind::Probe, "x".into(), Vec::new()));
    assert_eq!(second.events.lock()[0].seq, 1);
}

#[test]
fn test_panicking_classifier_is_reported_and_counted() {
    let cfg = config(1);
    let reports = MemoryWriter::new();
    let warnings = MemoryWriter::new();
    let sink = ReportSink::for_workers(cfg.workers_clamped(), reports.clone(), warnings.clone());
    assert!(!sink.is_synchronized());

    let recorder = Arc::new(Recorder::default());
    let mut runner = Runner::<Gis>::builder(cfg, ())
        .with_fan_out(FanOut::builder().on_every(sink.action()).build())
        .with_classifier(|_: &TaskError| -> Disposition { panic!("classifier bug") })
        .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
        .build();
    runner.add_task(
        TaskFn::<Gis, _>::new(Kind::Layer, |_: &()| Err(TaskError::fail("502 bad gateway")))
            .with_param("name", "broken"),
    );
    runner.add_task(ok(Kind::Layer, "after".into(), vec!["a".into()]));
    runner.start().unwrap();
    let summary = runner.wait_to_shutdown().unwrap();

    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded + summary.failed, summary.submitted);
    assert_eq!(summary.retried, 0);

    // The worker kept serving: both tasks are reported, in submission order.
    let rows = reports.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, "failed");
    assert_eq!(rows[0].params, "name=broken");
    assert_eq!(rows[1].status, "succeeded");
    assert_eq!(warnings.rows().len(), 1);
    assert_eq!(sink.report_rows(), 2);

    assert_eq!(recorder.count(EventKind::TaskFailed), 1);
    assert_eq!(recorder.count(EventKind::WorkerPanicked), 0);
}
