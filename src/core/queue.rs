//! # Blocking FIFO with a completion barrier.
//!
//! [`TaskQueue`] is the queue both the `ready` and `retry` sides of the runner use.
//! Besides `put`/`pop` it counts **unfinished** items: `put` increments the counter,
//! [`TaskQueue::task_done`] decrements it, and [`TaskQueue::join`] blocks until it is zero.
//!
//! ```text
//! put ──► unfinished += 1 ──► items ──► pop (blocks while empty)
//!                                          │
//!                                   ... item processed ...
//!                                          │
//! join ◄── wakes when unfinished == 0 ◄── task_done
//! ```
//!
//! Anything a consumer puts back (children, retries) is put **before** its own
//! `task_done`, so the counter never reaches zero while work is still reachable.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct State<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

/// Thread-safe FIFO with `task_done`/`join` accounting.
pub(crate) struct TaskQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    all_done: Condvar,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            not_empty: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    /// Appends an item and counts it as unfinished.
    pub(crate) fn put(&self, item: T) {
        let mut st = self.state.lock();
        st.items.push_back(item);
        st.unfinished += 1;
        drop(st);
        self.not_empty.notify_one();
    }

    /// Removes the oldest item, blocking while the queue is empty.
    pub(crate) fn pop(&self) -> T {
        let mut st = self.state.lock();
        loop {
            if let Some(item) = st.items.pop_front() {
                return item;
            }
            self.not_empty.wait(&mut st);
        }
    }

    /// Removes the oldest item if there is one.
    #[cfg(test)]
    pub(crate) fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Marks one popped item as processed.
    pub(crate) fn task_done(&self) {
        let mut st = self.state.lock();
        if st.unfinished == 0 {
            tracing::warn!("task_done called more times than items were put");
            return;
        }
        st.unfinished -= 1;
        if st.unfinished == 0 {
            self.all_done.notify_all();
        }
    }

    /// Blocks until every item ever put has been marked done.
    pub(crate) fn join(&self) {
        let mut st = self.state.lock();
        while st.unfinished > 0 {
            self.all_done.wait(&mut st);
        }
    }

    /// Takes every queued item at once and marks them done here.
    pub(crate) fn drain(&self) -> Vec<T> {
        let mut st = self.state.lock();
        let items: Vec<T> = st.items.drain(..).collect();
        st.unfinished = st.unfinished.saturating_sub(items.len());
        if st.unfinished == 0 {
            self.all_done.notify_all();
        }
        items
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}
