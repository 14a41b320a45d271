//! # Scheduler: the state shared by the runner, its workers and running nodes.
//!
//! A [`Scheduler`] is a cheap clonable handle over one runner's queues, context,
//! classifier, policy, bus and counters. Workers hand it to every node they run so the
//! node can submit children and park itself for retry without owning a runner reference.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::queue::TaskQueue;
use crate::events::{Bus, Event, EventKind};
use crate::fanout::FanOut;
use crate::policies::{ErrorClassifier, RetryPolicy};
use crate::tasks::{BoxTask, Domain, TaskNode};

/// Item on the ready queue.
pub(crate) enum Message<D: Domain> {
    Run(Box<TaskNode<D>>),
    Stop,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) retried: AtomicU64,
}

pub(crate) struct Shared<D: Domain> {
    pub(crate) ready: TaskQueue<Message<D>>,
    pub(crate) retry: TaskQueue<Box<TaskNode<D>>>,
    pub(crate) context: Arc<D::Context>,
    pub(crate) classifier: Arc<dyn ErrorClassifier>,
    pub(crate) policy: RetryPolicy,
    pub(crate) bus: Bus,
    pub(crate) counters: Counters,
}

/// Handle to one runner's shared state.
pub(crate) struct Scheduler<D: Domain> {
    shared: Arc<Shared<D>>,
}

impl<D: Domain> Clone for Scheduler<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: Domain> Scheduler<D> {
    pub(crate) fn new(
        context: Arc<D::Context>,
        classifier: Arc<dyn ErrorClassifier>,
        policy: RetryPolicy,
        bus: Bus,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                ready: TaskQueue::new(),
                retry: TaskQueue::new(),
                context,
                classifier,
                policy,
                bus,
                counters: Counters::default(),
            }),
        }
    }

    /// Wraps `task` in a node and puts it on the ready queue; returns the node id.
    pub(crate) fn submit(
        &self,
        task: BoxTask<D>,
        fan_out: Arc<FanOut<D>>,
        parent: Option<u64>,
    ) -> u64 {
        let id = self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        let attempts = task
            .attempts()
            .map_or_else(|| self.shared.policy.attempts_clamped(), |n| n.max(1));
        let node = TaskNode::new(id, parent, task, fan_out, attempts);

        tracing::debug!(task_id = id, parent = ?parent, kind = %node.kind(), "task submitted");
        self.shared.bus.publish(
            Event::new(EventKind::TaskSubmitted)
                .with_task(id, node.label())
                .with_parent(parent),
        );
        self.shared.ready.put(Message::Run(Box::new(node)));
        id
    }

    /// Parks a transiently failed node until the next retry round.
    pub(crate) fn requeue(&self, node: Box<TaskNode<D>>) {
        self.shared.counters.retried.fetch_add(1, Ordering::Relaxed);
        self.shared.retry.put(node);
    }

    pub(crate) fn record_success(&self) {
        self.shared.counters.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.shared.counters.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn context(&self) -> &D::Context {
        &self.shared.context
    }

    pub(crate) fn classifier(&self) -> &dyn ErrorClassifier {
        self.shared.classifier.as_ref()
    }

    pub(crate) fn policy(&self) -> RetryPolicy {
        self.shared.policy
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    pub(crate) fn ready(&self) -> &TaskQueue<Message<D>> {
        &self.shared.ready
    }

    pub(crate) fn retry(&self) -> &TaskQueue<Box<TaskNode<D>>> {
        &self.shared.retry
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.shared.counters
    }
}
