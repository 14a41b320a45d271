//! # Runner: worker pool, submission and the drain/shutdown protocol.
//!
//! The [`Runner`] owns a fixed pool of OS worker threads, the `ready` and `retry`
//! queues, and the counters summarized in [`RunSummary`].
//!
//! ## High-level architecture
//! ```text
//! caller ── add_task ──► ready ◄───────────── children (fan-out Spawn actions)
//!                          │
//!                 ┌────────┼────────┐
//!                 ▼        ▼        ▼
//!             worker-0 worker-1 … worker-N   node.run(): exec, classify, post-actions
//!                 │        │        │
//!                 └── transient failure with budget left ──► retry
//!
//! wait_to_shutdown() on the caller thread:
//!   loop {
//!     ready.join()                      all queued work and its children done
//!     retry empty? ── yes ─► break
//!     sleep(backoff.next(round)) ─► move retry ─► ready   (RetryRound)
//!   }
//!   one Stop per worker ─► join all ─► AllStopped
//! ```
//!
//! ## Rules
//! - Children are enqueued **before** their parent's `task_done`, so `ready.join()`
//!   cannot return while any reachable work is outstanding.
//! - Retries are only moved back while `ready` is idle: one retry round at a time.
//! - `submitted` is for reporting only; it never drives scheduling.
//!
//! ## Example
//! ```rust
//! use std::fmt;
//! use std::time::Duration;
//! use taskgraph::{
//!     BackoffPolicy, Domain, FanOut, MemoryWriter, ReportRow, ReportSink, Runner,
//!     RunnerConfig, TaskError, TaskFn, WarningRow,
//! };
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Kind { Store, Layer }
//! impl fmt::Display for Kind {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str(match self { Kind::Store => "store", Kind::Layer => "layer" })
//!     }
//! }
//!
//! struct Gis;
//! impl Domain for Gis {
//!     type Context = ();
//!     type Kind = Kind;
//!     type Output = Vec<String>;
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reports = MemoryWriter::<ReportRow>::new();
//!     let sink = ReportSink::new(reports.clone(), MemoryWriter::<WarningRow>::new());
//!
//!     let fan_out = FanOut::<Gis>::builder()
//!         .children(Kind::Store, |layers: &Vec<String>| {
//!             layers
//!                 .iter()
//!                 .map(|name| {
//!                     TaskFn::<Gis, _>::new(Kind::Layer, |_: &()| Ok::<_, TaskError>(Vec::new()))
//!                         .with_param("layer", name)
//!                         .boxed()
//!                 })
//!                 .collect()
//!         })
//!         .on_every(sink.action())
//!         .build();
//!
//!     let mut cfg = RunnerConfig::default();
//!     cfg.workers = 2;
//!     cfg.backoff = BackoffPolicy::constant(Duration::from_millis(10));
//!
//!     let mut runner = Runner::builder(cfg, ()).with_fan_out(fan_out).build();
//!     runner.add_task(TaskFn::<Gis, _>::new(Kind::Store, |_: &()| {
//!         Ok(vec!["roads".to_string(), "rivers".to_string()])
//!     }));
//!     runner.start()?;
//!
//!     let summary = runner.wait_to_shutdown()?;
//!     assert_eq!(summary.submitted, 3);
//!     assert_eq!(reports.len(), 3);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::io;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::{
    core::{
        RunnerBuilder, RunnerConfig,
        scheduler::{Message, Scheduler},
        worker,
    },
    error::RuntimeError,
    events::{Event, EventKind},
    fanout::FanOut,
    tasks::{Domain, Task},
};

/// Counters of one completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Nodes submitted (roots and children).
    pub submitted: u64,
    /// Nodes that finished with an output.
    pub succeeded: u64,
    /// Nodes that finished with an error.
    pub failed: u64,
    /// Failed tries that were put on the retry queue.
    pub retried: u64,
    /// Retry rounds performed by the draining thread.
    pub rounds: u32,
    /// Time from building the runner to the end of shutdown.
    pub elapsed: Duration,
}

impl RunSummary {
    /// True if no node failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} submitted, {} succeeded, {} failed, {} retried in {} round(s), {:.3}s",
            self.submitted,
            self.succeeded,
            self.failed,
            self.retried,
            self.rounds,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Bounded worker pool executing a lazily expanding task graph.
pub struct Runner<D: Domain> {
    cfg: RunnerConfig,
    sched: Scheduler<D>,
    fan_out: Arc<FanOut<D>>,
    workers: Vec<JoinHandle<()>>,
    created: Instant,
}

impl<D: Domain> Runner<D> {
    /// Starts building a runner over `context`.
    pub fn builder(cfg: RunnerConfig, context: impl Into<Arc<D::Context>>) -> RunnerBuilder<D> {
        RunnerBuilder::new(cfg, context)
    }

    pub(crate) fn new_internal(
        cfg: RunnerConfig,
        sched: Scheduler<D>,
        fan_out: Arc<FanOut<D>>,
    ) -> Self {
        Self {
            cfg,
            sched,
            fan_out,
            workers: Vec::new(),
            created: Instant::now(),
        }
    }

    /// Submits a root task using the runner's fan-out table; returns its node id.
    ///
    /// May be called before or after [`Runner::start`].
    pub fn add_task(&self, task: impl Task<D>) -> u64 {
        self.sched.submit(Box::new(task), Arc::clone(&self.fan_out), None)
    }

    /// Submits a root task with an explicit fan-out table (inherited by its children).
    pub fn add_task_with(&self, task: impl Task<D>, fan_out: Arc<FanOut<D>>) -> u64 {
        self.sched.submit(Box::new(task), fan_out, None)
    }

    /// Spawns the worker threads.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyStarted`] if workers are running.
    /// - [`RuntimeError::WorkerSpawn`] if the OS refuses a thread; workers spawned
    ///   before the failure are stopped again.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        self.start_with(worker::spawn)
    }

    fn start_with<S>(&mut self, mut spawn: S) -> Result<(), RuntimeError>
    where
        S: FnMut(Scheduler<D>, usize, String) -> io::Result<JoinHandle<()>>,
    {
        if !self.workers.is_empty() {
            return Err(RuntimeError::AlreadyStarted);
        }
        let count = self.cfg.workers_clamped();
        for index in 0..count {
            match spawn(self.sched.clone(), index, self.cfg.worker_name(index)) {
                Ok(handle) => self.workers.push(handle),
                Err(source) => {
                    tracing::error!(index, error = %source, "failed to spawn worker");
                    if let Err(err) = self.stop_workers() {
                        tracing::warn!(error = %err, "cleanup after failed spawn");
                    }
                    return Err(RuntimeError::WorkerSpawn { index, source });
                }
            }
        }
        tracing::info!(workers = count, pending = self.pending(), "runner started");
        Ok(())
    }

    /// Nodes submitted so far (roots and children).
    pub fn submitted(&self) -> u64 {
        self.sched.counters().submitted.load(Ordering::Relaxed)
    }

    /// Nodes currently queued (ready or awaiting retry), not counting running ones.
    pub fn pending(&self) -> usize {
        self.sched.ready().len() + self.sched.retry().len()
    }

    /// True once [`Runner::start`] spawned the workers.
    pub fn is_started(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Blocks until every task and all work it spawned has finished, then stops the pool.
    ///
    /// Retry rounds happen here: each time the ready queue drains with nodes parked for
    /// retry, the caller sleeps `backoff.next(round)` and moves them back.
    ///
    /// # Errors
    /// - [`RuntimeError::NotStarted`] if tasks are pending but no worker was started.
    /// - [`RuntimeError::WorkerPanicked`] if a worker thread died instead of stopping.
    pub fn wait_to_shutdown(mut self) -> Result<RunSummary, RuntimeError> {
        if self.workers.is_empty() {
            let pending = self.pending();
            if pending > 0 {
                return Err(RuntimeError::NotStarted { pending });
            }
            return Ok(self.summary(0));
        }

        let ready = self.sched.ready();
        let retry = self.sched.retry();
        let mut rounds: u32 = 0;
        loop {
            ready.join();
            if retry.is_empty() {
                break;
            }
            let delay = self.cfg.backoff.next(rounds);
            rounds += 1;
            tracing::info!(
                round = rounds,
                parked = retry.len(),
                delay_ms = delay.as_millis() as u64,
                "retry round"
            );
            thread::sleep(delay);

            let batch = retry.drain();
            self.sched.bus().publish(
                Event::new(EventKind::RetryRound)
                    .with_attempt(rounds)
                    .with_delay(delay)
                    .with_count(batch.len()),
            );
            for node in batch {
                ready.put(Message::Run(node));
            }
        }

        let result = self.stop_workers();
        let summary = self.summary(rounds);
        tracing::info!(%summary, "runner stopped");
        result.map(|()| summary)
    }

    /// Sends one stop sentinel per worker and joins them all.
    fn stop_workers(&mut self) -> Result<(), RuntimeError> {
        let workers = mem::take(&mut self.workers);
        self.sched.bus().publish(
            Event::new(EventKind::ShutdownRequested).with_count(workers.len()),
        );
        for _ in &workers {
            self.sched.ready().put(Message::Stop);
        }

        let mut first_err = None;
        for handle in workers {
            let name = handle
                .thread()
                .name()
                .unwrap_or("<unnamed>")
                .to_string();
            if handle.join().is_err() {
                tracing::error!(worker = %name, "worker thread panicked");
                first_err.get_or_insert(RuntimeError::WorkerPanicked { name });
            }
        }
        self.sched.bus().publish(Event::new(EventKind::AllStopped));
        first_err.map_or(Ok(()), Err)
    }

    fn summary(&self, rounds: u32) -> RunSummary {
        let c = self.sched.counters();
        RunSummary {
            submitted: c.submitted.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            rounds,
            elapsed: self.created.elapsed(),
        }
    }
}

impl<D: Domain> Drop for Runner<D> {
    /// Stops workers of a runner dropped without [`Runner::wait_to_shutdown`].
    ///
    /// Sentinels queue behind pending work, so workers finish what is already ready
    /// and exit; their threads are detached.
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        tracing::debug!(workers = self.workers.len(), "runner dropped while running");
        for _ in self.workers.drain(..) {
            self.sched.ready().put(Message::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::policies::BackoffPolicy;
    use crate::tasks::TaskFn;
    use crate::test_support::{Kind, T};

    fn cfg(workers: usize) -> RunnerConfig {
        RunnerConfig {
            workers,
            backoff: BackoffPolicy::constant(Duration::from_millis(5)),
            ..RunnerConfig::default()
        }
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut runner = Runner::<T>::builder(cfg(1), ()).build();
        runner.start().unwrap();
        assert!(matches!(runner.start(), Err(RuntimeError::AlreadyStarted)));
        let summary = runner.wait_to_shutdown().unwrap();
        assert_eq!(summary, RunSummary { elapsed: summary.elapsed, ..RunSummary::default() });
    }

    #[test]
    fn test_not_started_with_pending_tasks() {
        let runner = Runner::<T>::builder(cfg(1), ()).build();
        runner.add_task(TaskFn::<T, _>::new(Kind::Probe, |_: &()| Ok(1)));
        match runner.wait_to_shutdown() {
            Err(RuntimeError::NotStarted { pending }) => assert_eq!(pending, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_runner_returns_immediately() {
        let summary = Runner::<T>::builder(cfg(3), ()).build().wait_to_shutdown().unwrap();
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.rounds, 0);
    }

    #[test]
    fn test_tasks_added_after_start_are_run() {
        let mut runner = Runner::<T>::builder(cfg(2), ()).build();
        runner.start().unwrap();
        for _ in 0..5 {
            runner.add_task(TaskFn::<T, _>::new(Kind::Probe, |_: &()| Ok(1)));
        }
        let summary = runner.wait_to_shutdown().unwrap();
        assert_eq!(summary.submitted, 5);
        assert_eq!(summary.succeeded, 5);
        assert!(summary.is_clean());
    }

    #[test]
    fn test_summary_counts_retry_rounds() {
        let mut runner = Runner::<T>::builder(cfg(2), ()).build();
        runner.add_task(TaskFn::<T, _>::new(Kind::Probe, |_: &()| {
            Err(TaskError::connection("refused"))
        }));
        runner.start().unwrap();
        let summary = runner.wait_to_shutdown().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retried, 2);
        assert_eq!(summary.rounds, 2);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_spawn_failure_stops_started_workers() {
        let mut runner = Runner::<T>::builder(cfg(3), ()).build();
        let res = runner.start_with(|_sched, index, name| {
            if index == 0 {
                thread::Builder::new().name(name).spawn(|| {
                    panic!("worker crashed on start");
                })
            } else {
                Err(io::Error::other("thread limit reached"))
            }
        });
        match res {
            Err(RuntimeError::WorkerSpawn { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!runner.is_started());
    }

    #[test]
    fn test_dropping_started_runner_does_not_hang() {
        let mut runner = Runner::<T>::builder(cfg(2), ()).build();
        runner.start().unwrap();
        drop(runner);
    }
}
