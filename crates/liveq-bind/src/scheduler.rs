#![forbid(unsafe_code)]

//! Deferred single-threaded task queue.
//!
//! Work the binding must not do synchronously — clearing stored query
//! errors after a render, most notably — is posted here as an explicit
//! task instead of hiding behind a platform timer. The host drains the
//! queue at a point of its choosing (end of a render cycle, idle tick).
//!
//! Ordering: tasks run in FIFO order. A task posted while draining runs in
//! the same drain. Relative to notifications the only guarantee is the one
//! the binding relies on: a posted task does not run before `drain`, so a
//! notification delivered in between still sees the pre-task state.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

/// A FIFO queue of deferred tasks.
#[derive(Default)]
pub struct DeferredQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl DeferredQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a task to run on the next drain.
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run queued tasks in FIFO order until the queue is empty, including
    /// tasks posted by tasks. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the borrow before running: tasks may post more tasks.
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("queued", &self.len())
            .finish()
    }
}
