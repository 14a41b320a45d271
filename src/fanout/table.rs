//! # Fan-out table.
//!
//! [`FanOut`] maps a task kind to the ordered post-actions run when a task of that kind
//! finishes. It is built once, frozen, and shared by `Arc` across the whole graph:
//! every child inherits the table of the parent that spawned it.
//!
//! ```text
//! ListWorkspaces ─► [spawn ListStores per workspace]
//! ListStores     ─► [spawn GetLayer per layer]
//! GetLayer       ─► [spawn Probe if geometry]
//! every kind     ─► [sink.action()]
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PostActionError;
use crate::fanout::action::PostAction;
use crate::tasks::{BoxTask, Domain, TaskNode};

/// Immutable lookup table from task kind to post-actions.
pub struct FanOut<D: Domain> {
    by_kind: HashMap<D::Kind, Vec<PostAction<D>>>,
    every: Vec<PostAction<D>>,
}

impl<D: Domain> Default for FanOut<D> {
    fn default() -> Self {
        Self {
            by_kind: HashMap::new(),
            every: Vec::new(),
        }
    }
}

impl<D: Domain> FanOut<D> {
    /// Starts an empty table.
    pub fn builder() -> FanOutBuilder<D> {
        FanOutBuilder {
            table: FanOut::default(),
        }
    }

    /// A table with no actions: tasks finish and nothing follows.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Actions for `kind`: kind-specific ones first, then the table-wide ones.
    pub fn actions(&self, kind: D::Kind) -> impl Iterator<Item = &PostAction<D>> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .chain(self.every.iter())
    }

    /// True if `kind` has kind-specific actions.
    pub fn has(&self, kind: D::Kind) -> bool {
        self.by_kind.get(&kind).is_some_and(|a| !a.is_empty())
    }

    /// True if no action is registered at all.
    pub fn is_empty(&self) -> bool {
        self.every.is_empty() && self.by_kind.values().all(Vec::is_empty)
    }
}

/// Builder for [`FanOut`].
pub struct FanOutBuilder<D: Domain> {
    table: FanOut<D>,
}

impl<D: Domain> FanOutBuilder<D> {
    /// Appends an action for `kind`.
    pub fn on(mut self, kind: D::Kind, action: PostAction<D>) -> Self {
        self.table.by_kind.entry(kind).or_default().push(action);
        self
    }

    /// Appends a child generator for `kind`.
    pub fn spawn<F>(self, kind: D::Kind, f: F) -> Self
    where
        F: Fn(&TaskNode<D>) -> Result<Vec<BoxTask<D>>, PostActionError> + Send + Sync + 'static,
    {
        self.on(kind, PostAction::spawn(f))
    }

    /// Appends an output-driven child generator for `kind`.
    pub fn children<F>(self, kind: D::Kind, f: F) -> Self
    where
        F: Fn(&D::Output) -> Vec<BoxTask<D>> + Send + Sync + 'static,
    {
        self.on(kind, PostAction::children(f))
    }

    /// Appends a reporting action for `kind`.
    pub fn report<F>(self, kind: D::Kind, f: F) -> Self
    where
        F: Fn(&TaskNode<D>) -> Result<(), PostActionError> + Send + Sync + 'static,
    {
        self.on(kind, PostAction::report(f))
    }

    /// Appends an action run after the kind-specific ones for every kind.
    pub fn on_every(mut self, action: PostAction<D>) -> Self {
        self.table.every.push(action);
        self
    }

    /// Freezes the table.
    pub fn build(self) -> Arc<FanOut<D>> {
        Arc::new(self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;
    use crate::test_support::{Kind, T};

    fn probe() -> BoxTask<T> {
        TaskFn::<T, _>::new(Kind::Probe, |_: &()| Ok(0)).boxed()
    }

    #[test]
    fn test_kind_actions_precede_every() {
        let table = FanOut::<T>::builder()
            .on_every(PostAction::report(|_| Ok(())))
            .children(Kind::List, |n: &i64| (0..*n).map(|_| probe()).collect())
            .build();

        let kinds: Vec<bool> = table.actions(Kind::List).map(PostAction::is_spawn).collect();
        assert_eq!(kinds, vec![true, false]);

        let probe_actions: Vec<bool> = table
            .actions(Kind::Probe)
            .map(PostAction::is_spawn)
            .collect();
        assert_eq!(probe_actions, vec![false]);
    }

    #[test]
    fn test_unknown_kind_has_no_actions() {
        let table = FanOut::<T>::builder()
            .children(Kind::List, |_| Vec::new())
            .build();
        assert!(table.has(Kind::List));
        assert!(!table.has(Kind::Probe));
        assert_eq!(table.actions(Kind::Probe).count(), 0);
        assert!(FanOut::<T>::empty().is_empty());
    }

    #[test]
    fn test_children_generator_is_deterministic() {
        let table = FanOut::<T>::builder()
            .children(Kind::List, |n: &i64| (0..*n).map(|_| probe()).collect())
            .build();
        let node = TaskNode::succeeded_for_test(Kind::List, 3);

        for _ in 0..3 {
            let spawned: usize = table
                .actions(Kind::List)
                .map(|a| match a {
                    PostAction::Spawn(f) => f(&node).map(|c| c.len()).unwrap_or(0),
                    PostAction::Report(_) => 0,
                })
                .sum();
            assert_eq!(spawned, 3);
        }
    }
}
