use std::sync::Arc;

use crate::{
    core::{RunnerConfig, runner::Runner, scheduler::Scheduler},
    events::Bus,
    fanout::FanOut,
    policies::{ErrorClassifier, SignatureClassifier},
    subscribers::Subscribe,
    tasks::Domain,
};

/// Builder for constructing a [`Runner`] with optional features.
pub struct RunnerBuilder<D: Domain> {
    cfg: RunnerConfig,
    context: Arc<D::Context>,
    fan_out: Option<Arc<FanOut<D>>>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<D: Domain> RunnerBuilder<D> {
    /// Creates a new builder with the given configuration and task context.
    pub fn new(cfg: RunnerConfig, context: impl Into<Arc<D::Context>>) -> Self {
        Self {
            cfg,
            context: context.into(),
            fan_out: None,
            classifier: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the fan-out table used by [`Runner::add_task`] (and inherited by children).
    ///
    /// Defaults to an empty table.
    pub fn with_fan_out(mut self, fan_out: Arc<FanOut<D>>) -> Self {
        self.fan_out = Some(fan_out);
        self
    }

    /// Replaces the transient/permanent classifier.
    ///
    /// Defaults to [`SignatureClassifier::default`].
    pub fn with_classifier(mut self, classifier: impl ErrorClassifier) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers are called synchronously on the publishing thread (a worker or the
    /// caller draining the queues).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the runner. No thread is spawned until [`Runner::start`].
    pub fn build(self) -> Runner<D> {
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(SignatureClassifier::default()));
        let sched = Scheduler::new(
            self.context,
            classifier,
            self.cfg.retry,
            Bus::new(self.subscribers),
        );
        Runner::new_internal(
            self.cfg,
            sched,
            self.fan_out.unwrap_or_else(FanOut::empty),
        )
    }
}
